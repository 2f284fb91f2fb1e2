//! services/client/src/app/quiz_task.rs
//!
//! Interactive quiz for the current page. Answers are scored locally against
//! the answer delivered with each question; nothing is sent to the backend
//! after the quiz is loaded.

use crate::app::render;
use crate::app::viewer::{Outcome, PanelKind, Viewer};
use crate::error::ClientError;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;
use vox_study_core::study::{parse_option, QuizError};

/// Message shown when the backend has lost the open document.
pub const SESSION_EXPIRED: &str =
    "This session expired or the server restarted. Please re-upload your file to continue.";

/// Loads the quiz and asks each question once. `q` on an empty prompt quits early.
pub async fn run_quiz<R, W>(viewer: &mut Viewer, input: R, out: &mut W) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    match viewer.load(PanelKind::Quiz).await? {
        Outcome::Applied(_) => {}
        Outcome::Failed(_, e) => return Err(e.into()),
        Outcome::SessionExpired(_) => {
            writeln!(out, "{SESSION_EXPIRED}")?;
            return Ok(());
        }
        Outcome::Discarded(..) => return Ok(()),
    }

    let total = viewer.quiz_mut().map(|q| q.len()).unwrap_or_default();
    if total == 0 {
        writeln!(out, "No quiz questions for this page.")?;
        return Ok(());
    }

    let mut lines = input.lines();
    let mut asked = 0;
    while asked < total {
        let Some(quiz) = viewer.quiz_mut() else {
            break;
        };
        writeln!(out, "\n{}", render::quiz_question(quiz))?;
        write!(out, "Your answer: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        let Some(choice) = parse_option(line) else {
            writeln!(out, "{}", QuizError::NoSelection)?;
            continue;
        };
        if let Err(e) = quiz.select(choice) {
            writeln!(out, "{e}")?;
            continue;
        }
        let verdict = quiz.submit()?;
        writeln!(out, "{}", render::verdict(&verdict))?;
        quiz.next();
        asked += 1;
    }

    if let Some(quiz) = viewer.quiz_mut() {
        let (correct, answered) = quiz.score();
        info!(correct, answered, "Quiz finished.");
        writeln!(out, "\n{}", render::score(quiz))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::FakeApi;
    use crate::app::viewer::ViewerOptions;
    use std::sync::Arc;
    use vox_study_core::ports::MemoryStorage;

    async fn viewer_on(docs: &[&str]) -> (Viewer, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::with_docs(docs));
        let mut viewer = Viewer::new(api.clone(), Arc::new(MemoryStorage::new()), ViewerOptions::default());
        viewer.open_document("doc-1", None).await.unwrap();
        (viewer, api)
    }

    #[tokio::test]
    async fn scores_answers_without_backend_calls() {
        let (mut viewer, api) = viewer_on(&["doc-1"]).await;
        let mut out = Vec::new();

        run_quiz(&mut viewer, &b"x\nb\n"[..], &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Option X does not exist for this question"));
        assert!(text.contains("Correct!"));
        assert!(text.contains("Score: 1/1"));
        assert!(!api.calls().iter().any(|c| c.starts_with("ask")));
    }

    #[tokio::test]
    async fn wrong_answer_reveals_the_expected_one() {
        let (mut viewer, _) = viewer_on(&["doc-1"]).await;
        let mut out = Vec::new();

        run_quiz(&mut viewer, &b"A\n"[..], &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Not quite. The answer is: 4"));
        assert!(text.contains("Score: 0/1"));
    }

    #[tokio::test]
    async fn lost_document_ends_the_quiz() {
        let (mut viewer, api) = viewer_on(&["doc-1"]).await;
        api.forget("doc-1");
        let mut out = Vec::new();

        run_quiz(&mut viewer, &b"a\n"[..], &mut out).await.unwrap();

        assert!(String::from_utf8(out).unwrap().contains(SESSION_EXPIRED));
        assert!(viewer.store().document().is_none());
    }
}
