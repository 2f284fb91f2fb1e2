//! services/client/src/app/study_task.rs
//!
//! The interactive study loop. It reads commands line by line while panel
//! requests run in the background, so the explanation for a page is fetched
//! as soon as the page is shown and navigation never waits for the backend.

use crate::app::quiz_task::SESSION_EXPIRED;
use crate::app::render;
use crate::app::viewer::{Outcome, PanelKind, PendingRequest, Viewer};
use crate::error::ClientError;
use futures::stream::{FuturesUnordered, StreamExt};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};
use vox_study_core::panel::DiscardReason;
use vox_study_core::ports::PortError;
use vox_study_core::study::{parse_option, Zoom};

pub const HELP: &str = "\
Commands:
  n, p, g <page>     next / previous / go to page
  e                  show the explanation for this page
  a <question>       ask about the document (ap <question> for this page only)
  f                  flashcards (flip, nc, pc)
  q                  quiz (pick <letter>, nq)
  c                  cheatsheet
  speak <file>       read the explanation aloud into an audio file
  zoom in|out        change page zoom
  theme, contrast, dyslexia, scale <percent>, prefs
  help, quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Next,
    Previous,
    GoTo(usize),
    Explain,
    Ask { question: String, page_scoped: bool },
    Flashcards,
    Flip,
    NextCard,
    PreviousCard,
    Quiz,
    Pick(usize),
    NextQuestion,
    Cheatsheet,
    Speak(String),
    ZoomIn,
    ZoomOut,
    Theme,
    Contrast,
    Dyslexia,
    Scale(u16),
    Prefs,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let command = match word.to_ascii_lowercase().as_str() {
            "n" | "next" => Command::Next,
            "p" | "prev" => Command::Previous,
            "g" | "go" => Command::GoTo(rest.parse().map_err(|_| format!("Not a page number: '{rest}'"))?),
            "e" | "explain" => Command::Explain,
            "a" | "ask" | "ap" if !rest.is_empty() => Command::Ask {
                question: rest.to_string(),
                page_scoped: word.eq_ignore_ascii_case("ap"),
            },
            "f" | "flashcards" => Command::Flashcards,
            "flip" => Command::Flip,
            "nc" => Command::NextCard,
            "pc" => Command::PreviousCard,
            "q" | "quiz" => Command::Quiz,
            "pick" => Command::Pick(parse_option(rest).ok_or_else(|| format!("Not an option: '{rest}'"))?),
            "nq" => Command::NextQuestion,
            "c" | "cheatsheet" => Command::Cheatsheet,
            "speak" if !rest.is_empty() => Command::Speak(rest.to_string()),
            "zoom" if rest == "in" || rest == "+" => Command::ZoomIn,
            "zoom" if rest == "out" || rest == "-" => Command::ZoomOut,
            "theme" => Command::Theme,
            "contrast" => Command::Contrast,
            "dyslexia" => Command::Dyslexia,
            "scale" => Command::Scale(rest.parse().map_err(|_| format!("Not a percentage: '{rest}'"))?),
            "prefs" => Command::Prefs,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(format!("Unknown command '{line}'. Type 'help' for a list.")),
        };
        Ok(command)
    }
}

/// State of one interactive run.
struct StudyLoop<'a, W> {
    viewer: &'a mut Viewer,
    out: &'a mut W,
    pending: FuturesUnordered<PendingRequest>,
    /// Panels whose content the user asked to see when it arrives.
    awaiting: Vec<PanelKind>,
    zoom: Zoom,
}

/// Runs the study loop until `quit`, end of input or loss of the document.
pub async fn run_study<R, W>(viewer: &mut Viewer, input: R, out: &mut W) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut state = StudyLoop {
        viewer,
        out,
        pending: FuturesUnordered::new(),
        awaiting: Vec::new(),
        zoom: Zoom::default(),
    };

    state.show_page()?;
    loop {
        tokio::select! {
            biased;
            Some(completed) = state.pending.next(), if !state.pending.is_empty() => {
                let outcome = state.viewer.finish(completed);
                if !state.report(outcome)? {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = state.execute(command).await {
                            if !state.notify(e)? {
                                break;
                            }
                        }
                    }
                    Err(message) => writeln!(state.out, "{message}")?,
                }
            }
        }
    }
    info!("Study session ended.");
    Ok(())
}

impl<W: Write> StudyLoop<'_, W> {
    fn show_page(&mut self) -> Result<(), ClientError> {
        let doc = self.viewer.store().document().ok_or(ClientError::NoDocument)?;
        writeln!(self.out, "{}", render::document_header(doc))?;
        self.awaiting.retain(|k| *k == PanelKind::Answer);
        if self.viewer.needs_load(PanelKind::Explanation) {
            self.spawn(PanelKind::Explanation)?;
        }
        Ok(())
    }

    fn spawn(&mut self, kind: PanelKind) -> Result<(), ClientError> {
        debug!(panel = kind.label(), "Fetching in the background.");
        self.pending.push(self.viewer.request(kind)?);
        Ok(())
    }

    fn want(&mut self, kind: PanelKind) -> Result<(), ClientError> {
        if !self.awaiting.contains(&kind) {
            self.awaiting.push(kind);
        }
        if self.viewer.needs_load(kind) {
            self.spawn(kind)?;
        }
        self.show_ready()
    }

    /// Prints awaited content that is available for the current page.
    fn show_ready(&mut self) -> Result<(), ClientError> {
        let awaiting = std::mem::take(&mut self.awaiting);
        for kind in awaiting {
            let rendered = match kind {
                PanelKind::Explanation => self.viewer.explanation().map(render::explanation),
                PanelKind::Flashcards => self.viewer.flashcards_mut().map(|d| render::flashcard(d)),
                PanelKind::Quiz => self.viewer.quiz_mut().map(|q| render::quiz_question(q)),
                PanelKind::Cheatsheet => self.viewer.cheatsheet().map(str::to_string),
                PanelKind::Answer => None,
            };
            match rendered {
                Some(text) => writeln!(self.out, "\n{text}\n")?,
                None => self.awaiting.push(kind),
            }
        }
        Ok(())
    }

    /// Reports a background result. Returns `false` when the loop must end.
    fn report(&mut self, outcome: Outcome) -> Result<bool, ClientError> {
        match outcome {
            Outcome::Applied(PanelKind::Answer) => {
                if let Some(answer) = self.viewer.answer(true).or_else(|| self.viewer.answer(false)) {
                    writeln!(self.out, "\n{}\n", render::answer(answer))?;
                }
                self.awaiting.retain(|k| *k != PanelKind::Answer);
            }
            Outcome::Applied(_) => self.show_ready()?,
            Outcome::Failed(kind, e) => {
                warn!(panel = kind.label(), error = %e, "Panel request failed.");
                if self.awaiting.contains(&kind) {
                    self.awaiting.retain(|k| *k != kind);
                    writeln!(self.out, "Could not load the {}. Error: {e}", kind.label())?;
                }
            }
            Outcome::Discarded(PanelKind::Answer, reason) => {
                debug!(?reason, "Answer dropped.");
                if self.awaiting.contains(&PanelKind::Answer) {
                    self.awaiting.retain(|k| *k != PanelKind::Answer);
                    let note = match reason {
                        DiscardReason::KeyChanged => "The answer was for the previous page and has been dropped.",
                        DiscardReason::Superseded => "A newer question replaced the previous one.",
                        DiscardReason::Cancelled => "The question was cancelled.",
                    };
                    writeln!(self.out, "{note}")?;
                }
            }
            Outcome::Discarded(..) => {}
            Outcome::SessionExpired(_) => {
                writeln!(self.out, "{SESSION_EXPIRED}")?;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Shows a failed command and keeps the session going. Returns `false`
    /// when the backend no longer has the document.
    fn notify(&mut self, e: ClientError) -> Result<bool, ClientError> {
        if e.port().is_some_and(PortError::is_document_not_found) {
            writeln!(self.out, "{SESSION_EXPIRED}")?;
            return Ok(false);
        }
        warn!(error = %e, "Command failed.");
        writeln!(self.out, "Error: {e}")?;
        Ok(true)
    }

    async fn execute(&mut self, command: Command) -> Result<(), ClientError> {
        match command {
            Command::Next | Command::Previous | Command::GoTo(_) => {
                let page_count = self.viewer.store().document().map_or(0, |d| d.page_count());
                let moved = match command {
                    Command::Next => self.viewer.next_page(),
                    Command::Previous => self.viewer.previous_page(),
                    // Jumping to the page already shown still counts.
                    Command::GoTo(page) => {
                        (1..=page_count).contains(&page) && {
                            self.viewer.jump_to_display_page(page);
                            true
                        }
                    }
                    _ => false,
                };
                if moved {
                    self.show_page()?;
                } else {
                    writeln!(self.out, "No such page.")?;
                }
            }
            Command::Explain => self.want(PanelKind::Explanation)?,
            Command::Ask { question, page_scoped } => {
                let pending = self.viewer.request_answer(&question, page_scoped)?;
                self.pending.push(pending);
                self.awaiting.push(PanelKind::Answer);
                writeln!(self.out, "Thinking...")?;
            }
            Command::Flashcards => self.want(PanelKind::Flashcards)?,
            Command::Flip | Command::NextCard | Command::PreviousCard => match self.viewer.flashcards_mut() {
                Some(deck) => {
                    match command {
                        Command::Flip => deck.flip(),
                        Command::NextCard => deck.next(),
                        _ => deck.previous(),
                    }
                    writeln!(self.out, "{}", render::flashcard(deck))?;
                }
                None => writeln!(self.out, "Open the flashcards first with 'f'.")?,
            },
            Command::Quiz => self.want(PanelKind::Quiz)?,
            Command::Pick(option) => match self.viewer.quiz_mut() {
                Some(quiz) => match quiz.select(option).and_then(|_| quiz.submit()) {
                    Ok(verdict) => {
                        writeln!(self.out, "{}", render::verdict(&verdict))?;
                        writeln!(self.out, "{}", render::score(quiz))?;
                    }
                    Err(e) => writeln!(self.out, "{e}")?,
                },
                None => writeln!(self.out, "Open the quiz first with 'q'.")?,
            },
            Command::NextQuestion => match self.viewer.quiz_mut() {
                Some(quiz) => {
                    quiz.next();
                    writeln!(self.out, "{}", render::quiz_question(quiz))?;
                }
                None => writeln!(self.out, "Open the quiz first with 'q'.")?,
            },
            Command::Cheatsheet => self.want(PanelKind::Cheatsheet)?,
            Command::Speak(path) => {
                let Some(text) = self.viewer.explanation().map(|e| e.explanation.clone()) else {
                    writeln!(self.out, "The explanation for this page is not loaded yet.")?;
                    return Ok(());
                };
                let clip = self.viewer.speak(&text).await?;
                tokio::fs::write(Path::new(&path), &clip.bytes).await?;
                writeln!(self.out, "Saved {} bytes of audio to {path}", clip.len())?;
            }
            Command::ZoomIn | Command::ZoomOut => {
                if command == Command::ZoomIn {
                    self.zoom.zoom_in();
                } else {
                    self.zoom.zoom_out();
                }
                writeln!(self.out, "{}", render::zoom(self.zoom))?;
            }
            Command::Theme => self.viewer.toggle_theme()?,
            Command::Contrast => self.viewer.toggle_high_contrast()?,
            Command::Dyslexia => self.viewer.toggle_dyslexia_font()?,
            Command::Scale(percent) => {
                if let Err(e) = self.viewer.set_text_scale_percent(percent) {
                    writeln!(self.out, "{e}")?;
                }
            }
            Command::Prefs => writeln!(self.out, "{}", render::preferences(self.viewer.store().ui()))?,
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::FakeApi;
    use crate::app::viewer::ViewerOptions;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vox_study_core::ports::MemoryStorage;

    async fn run(docs: &[&str], input: &str) -> (String, Viewer, Arc<FakeApi>) {
        run_with(FakeApi::with_docs(docs), input).await
    }

    async fn run_with(api: FakeApi, input: &str) -> (String, Viewer, Arc<FakeApi>) {
        let api = Arc::new(api);
        let mut viewer = Viewer::new(api.clone(), Arc::new(MemoryStorage::new()), ViewerOptions::default());
        viewer.open_document("doc-1", Some("Lecture")).await.unwrap();
        let mut out = Vec::new();
        run_study(&mut viewer, input.as_bytes(), &mut out).await.unwrap();
        (String::from_utf8(out).unwrap(), viewer, api)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("g 3"), Ok(Command::GoTo(3)));
        assert_eq!(
            Command::parse("ap what is this?"),
            Ok(Command::Ask {
                question: "what is this?".to_string(),
                page_scoped: true
            })
        );
        assert_eq!(Command::parse("pick b"), Ok(Command::Pick(1)));
        assert_eq!(Command::parse("zoom +"), Ok(Command::ZoomIn));
        assert!(Command::parse("ask").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[tokio::test]
    async fn prefetches_explanations_while_navigating() {
        let (out, _, api) = run(&["doc-1"], "n\ne\nquit\n").await;

        assert!(out.contains("Lecture (doc-1): Page 1 of 3"));
        assert!(out.contains("Lecture (doc-1): Page 2 of 3"));
        assert!(out.contains("Explanation of page 1"));
        let explains: Vec<String> = api.calls().into_iter().filter(|c| c.starts_with("explain")).collect();
        assert_eq!(explains.len(), 2);
    }

    #[tokio::test]
    async fn asks_and_prints_sources() {
        let (out, viewer, _) = run(&["doc-1"], "a what is osmosis?\n").await;

        assert!(out.contains("Answer to what is osmosis?"));
        assert!(out.contains("Sources: page 2"));
        assert_eq!(viewer.store().qa().last_question.as_deref(), Some("what is osmosis?"));
    }

    #[tokio::test]
    async fn quiz_and_flashcards_are_driven_locally() {
        let (out, _, _) = run(&["doc-1"], "q\npick b\nf\nflip\nzoom in\n").await;

        assert!(out.contains("Question 1/1"));
        assert!(out.contains("Correct!"));
        assert!(out.contains("Score: 1/1"));
        assert!(out.contains("Card 1/2 (answer)\na1"));
        assert!(out.contains("Zoom: 60%"));
    }

    #[tokio::test]
    async fn failed_panels_are_reported() {
        let (out, viewer, _) = run(&["doc-1"], "c\n").await;

        assert!(out.contains("Could not load the cheatsheet. Error: cheatsheet for page 0 unavailable"));
        assert!(viewer.store().document().is_some());
    }

    #[tokio::test]
    async fn navigating_past_the_end_is_refused() {
        let (out, viewer, _) = run(&["doc-1"], "g 9\np\ng 1\ng 3\n").await;

        assert_eq!(out.matches("No such page.").count(), 2);
        assert_eq!(out.matches("Page 1 of 3").count(), 2);
        assert_eq!(viewer.store().document().unwrap().current_index(), 2);
    }

    #[tokio::test]
    async fn speech_failure_keeps_the_session_running() {
        let api = FakeApi {
            tts_error: Some(PortError::http(503, "tts down")),
            ..FakeApi::with_docs(&["doc-1"])
        };
        let (out, viewer, _) = run_with(api, "e\nspeak lecture.mp3\nn\nquit\n").await;

        assert!(out.contains("Explanation of page 0"));
        assert!(out.contains("Error: tts down"));
        assert!(out.contains("Lecture (doc-1): Page 2 of 3"));
        assert!(viewer.store().audio().clip.is_none());
    }

    #[tokio::test]
    async fn unwritable_audio_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.mp3");
        let input = format!("e\nspeak {}\ntheme\nprefs\n", target.display());
        let (out, viewer, _) = run(&["doc-1"], &input).await;

        assert!(out.contains("Error: "));
        assert!(!target.exists());
        assert!(viewer.store().audio().clip.is_some());
        assert!(out.contains("theme:          dark"));
    }

    #[tokio::test]
    async fn dropped_answers_are_explained() {
        let api = Arc::new(FakeApi::with_docs(&["doc-1"]));
        let mut viewer = Viewer::new(api, Arc::new(MemoryStorage::new()), ViewerOptions::default());
        viewer.open_document("doc-1", None).await.unwrap();
        let mut out = Vec::new();
        let mut state = StudyLoop {
            viewer: &mut viewer,
            out: &mut out,
            pending: FuturesUnordered::new(),
            awaiting: vec![PanelKind::Answer],
            zoom: Zoom::default(),
        };

        let keep_going = state
            .report(Outcome::Discarded(PanelKind::Answer, DiscardReason::KeyChanged))
            .unwrap();
        assert!(keep_going);
        assert!(state.awaiting.is_empty());
        // Already reported once.
        state
            .report(Outcome::Discarded(PanelKind::Answer, DiscardReason::KeyChanged))
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("was for the previous page").count(), 1);
    }
}
