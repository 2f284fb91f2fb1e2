//! services/client/src/app/testing.rs
//!
//! Shared test doubles for the viewer and the interactive loops.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Mutex;
use vox_study_core::domain::{AudioClip, FileUpload, Page};
use vox_study_core::ports::{PortError, PortResult, StudyApi};
use vox_study_core::protocol::{
    CheatsheetResponse, Citation, ExplanationResponse, FlashcardItem, FlashcardsResponse, PagesResponse, QaRequest,
    QaResponse, QuizItem, QuizResponse, TranscriptResponse, UploadResponse,
};

/// In-process stand-in for the backend. Documents listed in `known` exist
/// with three pages each.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) known: Mutex<Vec<String>>,
    pub(crate) upload_error: Option<PortError>,
    pub(crate) tts_error: Option<PortError>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn with_docs(docs: &[&str]) -> Self {
        Self {
            known: Mutex::new(docs.iter().map(|d| d.to_string()).collect()),
            ..Default::default()
        }
    }

    pub(crate) fn forget(&self, doc_id: &str) {
        self.known.lock().unwrap().retain(|d| d != doc_id);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, doc_id: &str) -> PortResult<()> {
        if self.known.lock().unwrap().iter().any(|d| d == doc_id) {
            Ok(())
        } else {
            Err(PortError::document_not_found("Document not found").with_status(404))
        }
    }
}

#[async_trait]
impl StudyApi for FakeApi {
    async fn upload(&self, file: FileUpload, name: Option<&str>) -> PortResult<UploadResponse> {
        self.record(format!("upload {}", file.file_name));
        if let Some(e) = &self.upload_error {
            return Err(e.clone());
        }
        self.known.lock().unwrap().push("uploaded".to_string());
        Ok(UploadResponse {
            doc_id: "uploaded".to_string(),
            name: name.unwrap_or(&file.file_name).to_string(),
            page_count: 3,
        })
    }

    async fn list_pages(&self, doc_id: &str) -> PortResult<PagesResponse> {
        self.record(format!("pages {doc_id}"));
        self.check(doc_id)?;
        Ok(PagesResponse {
            pages: (0..3).map(|page_id| Page { page_id }).collect(),
        })
    }

    async fn page_image(&self, doc_id: &str, _page_id: u32) -> PortResult<Bytes> {
        self.check(doc_id)?;
        Ok(Bytes::from_static(b"\x89PNG"))
    }

    async fn explain_page(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<ExplanationResponse> {
        self.record(format!("explain {doc_id} {page_id} {}", model.unwrap_or("-")));
        self.check(doc_id)?;
        Ok(ExplanationResponse {
            page_id,
            explanation: format!("Explanation of page {page_id}"),
        })
    }

    async fn ask(&self, doc_id: &str, request: &QaRequest) -> PortResult<QaResponse> {
        self.record(format!("ask {doc_id} {:?} {:?}", request.page_id, request.k));
        self.check(doc_id)?;
        Ok(QaResponse {
            answer: format!("Answer to {}", request.question),
            citations: Some(vec![Citation { page_id: 1 }]),
            used_contexts: None,
        })
    }

    async fn flashcards(&self, doc_id: &str, _page_id: u32, _model: Option<&str>) -> PortResult<FlashcardsResponse> {
        self.check(doc_id)?;
        Ok(FlashcardsResponse {
            items: vec![
                FlashcardItem { q: "q1".to_string(), a: "a1".to_string() },
                FlashcardItem { q: "q2".to_string(), a: "a2".to_string() },
            ],
        })
    }

    async fn quiz(&self, doc_id: &str, _page_id: u32, _model: Option<&str>) -> PortResult<QuizResponse> {
        self.check(doc_id)?;
        Ok(QuizResponse {
            items: vec![QuizItem {
                question: "2 + 2?".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                answer: "4".to_string(),
            }],
        })
    }

    async fn cheatsheet(&self, doc_id: &str, page_id: u32, _model: Option<&str>) -> PortResult<CheatsheetResponse> {
        self.check(doc_id)?;
        Err(PortError::http(500, format!("cheatsheet for page {page_id} unavailable")))
    }

    async fn text_to_speech(&self, text: &str) -> PortResult<AudioClip> {
        if let Some(e) = &self.tts_error {
            return Err(e.clone());
        }
        Ok(AudioClip::new(text.as_bytes().to_vec(), "audio/mpeg"))
    }

    async fn speech_to_text(&self, audio: FileUpload) -> PortResult<TranscriptResponse> {
        Ok(TranscriptResponse {
            text: format!("{} bytes", audio.bytes.len()),
        })
    }
}
