//! crates/vox_study_core/src/study.rs
//!
//! Local interaction state for the study panels: the flashcard deck, the quiz
//! session and the page zoom. Each works over a fixed sequence delivered in a
//! single backend response; nothing here talks to the backend.

use crate::protocol::{FlashcardItem, QuizItem};

//=========================================================================================
// Flashcards
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardDeck {
    cards: Vec<FlashcardItem>,
    index: usize,
    flipped: bool,
}

impl FlashcardDeck {
    pub fn new(cards: Vec<FlashcardItem>) -> Self {
        Self {
            cards,
            index: 0,
            flipped: false,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&FlashcardItem> {
        self.cards.get(self.index)
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Text on the visible side of the current card.
    pub fn visible_side(&self) -> Option<&str> {
        self.current()
            .map(|card| if self.flipped { card.a.as_str() } else { card.q.as_str() })
    }

    pub fn flip(&mut self) {
        if !self.cards.is_empty() {
            self.flipped = !self.flipped;
        }
    }

    /// Advances to the next card, wrapping to the first.
    pub fn next(&mut self) {
        if self.cards.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.cards.len();
        self.flipped = false;
    }

    /// Goes back one card, wrapping to the last.
    pub fn previous(&mut self) {
        if self.cards.is_empty() {
            return;
        }
        self.index = (self.index + self.cards.len() - 1) % self.cards.len();
        self.flipped = false;
    }
}

//=========================================================================================
// Quiz
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("The quiz has no questions")]
    Empty,
    #[error("Please select an answer")]
    NoSelection,
    /// Carries the label the user typed, not the index.
    #[error("Option {0} does not exist for this question")]
    NoSuchOption(String),
    #[error("This question has already been answered")]
    AlreadySubmitted,
}

/// Result of submitting one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizVerdict {
    pub correct: bool,
    pub selected: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    items: Vec<QuizItem>,
    index: usize,
    selected: Option<usize>,
    verdict: Option<QuizVerdict>,
    correct: u32,
    answered: u32,
}

impl QuizSession {
    pub fn new(items: Vec<QuizItem>) -> Self {
        Self {
            items,
            index: 0,
            selected: None,
            verdict: None,
            correct: 0,
            answered: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&QuizItem> {
        self.items.get(self.index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn verdict(&self) -> Option<&QuizVerdict> {
        self.verdict.as_ref()
    }

    /// `(correct, answered)` since the quiz was loaded.
    pub fn score(&self) -> (u32, u32) {
        (self.correct, self.answered)
    }

    /// Chooses the option at `option` (0-based) for the current question.
    pub fn select(&mut self, option: usize) -> Result<(), QuizError> {
        let item = self.current().ok_or(QuizError::Empty)?;
        if self.verdict.is_some() {
            return Err(QuizError::AlreadySubmitted);
        }
        if option >= item.options.len() {
            return Err(QuizError::NoSuchOption(option_label(option)));
        }
        self.selected = Some(option);
        Ok(())
    }

    /// Compares the selected option with the delivered answer. Purely local.
    pub fn submit(&mut self) -> Result<QuizVerdict, QuizError> {
        let item = self.current().ok_or(QuizError::Empty)?;
        if self.verdict.is_some() {
            return Err(QuizError::AlreadySubmitted);
        }
        let option = self.selected.ok_or(QuizError::NoSelection)?;
        let selected = item.options[option].clone();
        let verdict = QuizVerdict {
            correct: selected == item.answer,
            selected,
            expected: item.answer.clone(),
        };

        self.answered += 1;
        if verdict.correct {
            self.correct += 1;
        }
        self.verdict = Some(verdict.clone());
        Ok(verdict)
    }

    /// Moves to the next question, wrapping to the first, and clears the selection.
    pub fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.items.len();
        self.selected = None;
        self.verdict = None;
    }
}

/// Letter label for an option index: 0 -> 'A'.
pub fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

/// Label shown back to the user: a letter while one exists, else the 1-based number.
fn option_label(index: usize) -> String {
    if index < 26 {
        option_letter(index).to_string()
    } else {
        (index + 1).to_string()
    }
}

/// Parses a letter (`b`) or 1-based number (`2`) into an option index.
pub fn parse_option(input: &str) -> Option<usize> {
    let input = input.trim();
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some((c.to_ascii_uppercase() as u8 - b'A') as usize),
        _ => input.parse::<usize>().ok().and_then(|n| n.checked_sub(1)),
    }
}

//=========================================================================================
// Zoom
//=========================================================================================

/// Page image zoom in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zoom(u16);

impl Zoom {
    pub const MIN: u16 = 50;
    pub const MAX: u16 = 200;
    pub const STEP: u16 = 10;

    pub fn percent(self) -> u16 {
        self.0
    }

    pub fn zoom_in(&mut self) {
        self.0 = (self.0 + Self::STEP).min(Self::MAX);
    }

    pub fn zoom_out(&mut self) {
        self.0 = self.0.saturating_sub(Self::STEP).max(Self::MIN);
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Zoom(Self::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn card(q: &str) -> FlashcardItem {
        FlashcardItem {
            q: q.to_string(),
            a: format!("answer to {q}"),
        }
    }

    fn question(answer: &str) -> QuizItem {
        QuizItem {
            question: "Which type of learning requires labeled data?".to_string(),
            options: vec![
                "Supervised Learning".to_string(),
                "Unsupervised Learning".to_string(),
                "Reinforcement Learning".to_string(),
            ],
            answer: answer.to_string(),
        }
    }

    #[test]
    fn deck_wraps_and_resets_flip() {
        let mut deck = FlashcardDeck::new(vec![card("one"), card("two"), card("three")]);
        deck.flip();
        assert_eq!(deck.visible_side(), Some("answer to one"));

        deck.previous();
        assert_eq!(deck.index(), 2);
        assert!(!deck.is_flipped());
        deck.next();
        assert_eq!(deck.visible_side(), Some("one"));
    }

    #[test]
    fn empty_deck_ignores_navigation() {
        let mut deck = FlashcardDeck::new(vec![]);
        deck.next();
        deck.flip();
        assert_eq!(deck.current(), None);
        assert!(!deck.is_flipped());
    }

    #[test]
    fn selecting_the_delivered_answer_is_correct() {
        let mut quiz = QuizSession::new(vec![question("Supervised Learning")]);
        quiz.select(0).unwrap();
        let verdict = quiz.submit().unwrap();
        assert!(verdict.correct);
        assert_eq!(quiz.score(), (1, 1));
    }

    #[test]
    fn any_other_option_is_incorrect() {
        let mut quiz = QuizSession::new(vec![question("Supervised Learning"), question("Reinforcement Learning")]);
        quiz.select(1).unwrap();
        let verdict = quiz.submit().unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.expected, "Supervised Learning");

        quiz.next();
        quiz.select(2).unwrap();
        assert!(quiz.submit().unwrap().correct);
        assert_eq!(quiz.score(), (1, 2));
    }

    #[test]
    fn submit_requires_a_selection_and_happens_once() {
        let mut quiz = QuizSession::new(vec![question("Supervised Learning")]);
        assert_eq!(quiz.submit(), Err(QuizError::NoSelection));
        assert_eq!(quiz.select(7), Err(QuizError::NoSuchOption("H".to_string())));
        assert_eq!(
            quiz.select(29).unwrap_err().to_string(),
            "Option 30 does not exist for this question"
        );

        quiz.select(0).unwrap();
        quiz.submit().unwrap();
        assert_eq!(quiz.submit(), Err(QuizError::AlreadySubmitted));
        assert_eq!(quiz.select(1), Err(QuizError::AlreadySubmitted));

        quiz.next();
        assert_eq!(quiz.index(), 0);
        assert_eq!(quiz.selected(), None);
    }

    #[test]
    fn empty_quiz_reports_empty() {
        let mut quiz = QuizSession::new(vec![]);
        assert_eq!(quiz.select(0), Err(QuizError::Empty));
        assert_eq!(quiz.submit(), Err(QuizError::Empty));
    }

    #[test]
    fn option_labels_round_trip() {
        assert_eq!(option_letter(0), 'A');
        assert_eq!(option_letter(3), 'D');
        assert_eq!(parse_option("b"), Some(1));
        assert_eq!(parse_option(" 3 "), Some(2));
        assert_eq!(parse_option("0"), None);
        assert_eq!(parse_option("?"), None);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut zoom = Zoom::default();
        zoom.zoom_out();
        assert_eq!(zoom.percent(), 50);
        for _ in 0..30 {
            zoom.zoom_in();
        }
        assert_eq!(zoom.percent(), 200);
    }
}
