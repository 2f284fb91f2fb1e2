//! services/client/src/app/render.rs
//!
//! Plain-text rendering of store state and panel content for the terminal.

use std::fmt::Write;
use vox_study_core::domain::{AudioState, DocumentSession, RecentDocument, Theme, UiPreferences};
use vox_study_core::protocol::{ExplanationResponse, QaResponse};
use vox_study_core::study::{option_letter, FlashcardDeck, QuizSession, QuizVerdict, Zoom};

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

pub fn document_header(doc: &DocumentSession) -> String {
    format!("{} ({}): {}", doc.name, doc.doc_id, doc.position_label())
}

pub fn page_list(doc: &DocumentSession) -> String {
    let mut out = format!("{} has {} pages\n", doc.name, doc.page_count());
    for (index, page) in doc.pages().iter().enumerate() {
        let marker = if index == doc.current_index() { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>3}  (page id {})", index + 1, page.page_id);
    }
    out
}

pub fn preferences(ui: &UiPreferences) -> String {
    let theme = match ui.theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    format!(
        "theme:          {theme}\n\
         dyslexia font:  {}\n\
         high contrast:  {}\n\
         text scale:     {}%\n\
         model:          {}",
        on_off(ui.dyslexia_font),
        on_off(ui.high_contrast),
        ui.text_scale.percent(),
        ui.selected_model,
    )
}

pub fn recent_documents(recents: &[RecentDocument]) -> String {
    if recents.is_empty() {
        return "No recent documents.".to_string();
    }
    let mut out = String::new();
    for doc in recents {
        let _ = writeln!(
            out,
            "{}  {}  ({} pages, last opened {})",
            doc.doc_id,
            doc.name,
            doc.page_count,
            doc.last_visited.format("%Y-%m-%d %H:%M"),
        );
    }
    out.trim_end().to_string()
}

pub fn explanation(response: &ExplanationResponse) -> String {
    format!("Page {}\n\n{}", response.page_id + 1, response.explanation.trim())
}

/// Answer text followed by its cited pages (1-based).
pub fn answer(response: &QaResponse) -> String {
    let mut out = response.answer.trim().to_string();
    let pages = response.citation_pages();
    if !pages.is_empty() {
        let labels: Vec<String> = pages.iter().map(|p| format!("page {}", p + 1)).collect();
        let _ = write!(out, "\n\nSources: {}", labels.join(", "));
    }
    out
}

pub fn flashcard(deck: &FlashcardDeck) -> String {
    match deck.visible_side() {
        Some(text) => {
            let side = if deck.is_flipped() { "answer" } else { "question" };
            format!("Card {}/{} ({side})\n{text}", deck.index() + 1, deck.len())
        }
        None => "No flashcards for this page.".to_string(),
    }
}

pub fn quiz_question(quiz: &QuizSession) -> String {
    let Some(item) = quiz.current() else {
        return "No quiz questions for this page.".to_string();
    };
    let mut out = format!("Question {}/{}\n{}\n", quiz.index() + 1, quiz.len(), item.question);
    for (index, option) in item.options.iter().enumerate() {
        let marker = if quiz.selected() == Some(index) { '*' } else { ' ' };
        let _ = writeln!(out, "{marker} {}) {option}", option_letter(index));
    }
    out.trim_end().to_string()
}

pub fn verdict(verdict: &QuizVerdict) -> String {
    if verdict.correct {
        "Correct!".to_string()
    } else {
        format!("Not quite. The answer is: {}", verdict.expected)
    }
}

pub fn score(quiz: &QuizSession) -> String {
    let (correct, answered) = quiz.score();
    format!("Score: {correct}/{answered}")
}

pub fn audio(state: &AudioState) -> String {
    match &state.clip {
        Some(clip) => format!(
            "Audio: {} bytes of {} at {}x{}",
            clip.len(),
            clip.content_type,
            state.rate.factor(),
            if state.playing { " (playing)" } else { "" },
        ),
        None => "Audio: none".to_string(),
    }
}

pub fn zoom(zoom: Zoom) -> String {
    format!("Zoom: {}%", zoom.percent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vox_study_core::domain::Page;
    use vox_study_core::protocol::{Citation, FlashcardItem, QuizItem};

    #[test]
    fn header_uses_one_based_position() {
        let doc = DocumentSession::new("doc-1", "Lecture", vec![Page { page_id: 0 }, Page { page_id: 1 }]).unwrap();
        assert_eq!(document_header(&doc), "Lecture (doc-1): Page 1 of 2");
    }

    #[test]
    fn answer_lists_cited_pages_for_display() {
        let response = QaResponse {
            answer: "Mitochondria.".to_string(),
            citations: Some(vec![Citation { page_id: 0 }, Citation { page_id: 4 }]),
            used_contexts: None,
        };
        assert_eq!(answer(&response), "Mitochondria.\n\nSources: page 1, page 5");

        let bare = QaResponse {
            citations: None,
            ..response
        };
        assert_eq!(answer(&bare), "Mitochondria.");
    }

    #[test]
    fn flashcard_shows_the_visible_side() {
        let mut deck = FlashcardDeck::new(vec![FlashcardItem {
            q: "ATP?".to_string(),
            a: "Energy currency".to_string(),
        }]);
        assert_eq!(flashcard(&deck), "Card 1/1 (question)\nATP?");
        deck.flip();
        assert_eq!(flashcard(&deck), "Card 1/1 (answer)\nEnergy currency");
        assert_eq!(flashcard(&FlashcardDeck::new(Vec::new())), "No flashcards for this page.");
    }

    #[test]
    fn quiz_marks_the_selected_option() {
        let mut quiz = QuizSession::new(vec![QuizItem {
            question: "2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            answer: "4".to_string(),
        }]);
        quiz.select(1).unwrap();
        assert_eq!(quiz_question(&quiz), "Question 1/1\n2 + 2?\n  A) 3\n* B) 4");
    }

    #[test]
    fn preferences_show_scale_in_percent() {
        let rendered = preferences(&UiPreferences::default());
        assert!(rendered.contains("text scale:     100%"));
        assert!(rendered.contains("theme:          light"));
    }
}
