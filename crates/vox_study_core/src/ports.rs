//! crates/vox_study_core/src/ports.rs
//!
//! Defines the service contracts (traits) the study client depends on.
//! The core never talks HTTP or touches the filesystem itself; adapters in the
//! client service implement these ports.

use crate::domain::{AudioClip, FileUpload, PersistedState};
use crate::protocol::{
    CheatsheetResponse, ExplanationResponse, FlashcardsResponse, PagesResponse, QaRequest, QaResponse,
    QuizResponse, TranscriptResponse, UploadResponse,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Mutex;

//=========================================================================================
// Normalized Port Error
//=========================================================================================

/// Broad category of a failed port operation. Callers match on this instead of
/// inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced a response (DNS, connect, reset).
    Transport,
    /// The backend answered with a non-2xx status.
    Http,
    /// The backend no longer knows the document, e.g. after a restart.
    DocumentNotFound,
    /// The response body did not match the expected shape.
    Decode,
    /// Local access was refused (audio file, storage directory).
    PermissionDenied,
    /// The caller supplied something unusable before any request was made.
    InvalidInput,
    /// The request was abandoned because its session ended.
    Cancelled,
    /// Local persistence failed.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Http => "http",
            ErrorKind::DocumentNotFound => "document not found",
            ErrorKind::Decode => "decode",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Storage => "storage",
        };
        f.write_str(label)
    }
}

/// The single error type for all port operations.
///
/// `message` is suitable for showing to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PortError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl PortError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Http, message).with_status(status)
    }

    pub fn document_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DocumentNotFound, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request cancelled")
    }

    pub fn is_document_not_found(&self) -> bool {
        self.kind == ErrorKind::DocumentNotFound
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The study backend. One method per backend operation; each call is sent
/// exactly once with no retry or caching.
#[async_trait]
pub trait StudyApi: Send + Sync {
    // --- Documents ---
    async fn upload(&self, file: FileUpload, name: Option<&str>) -> PortResult<UploadResponse>;

    async fn list_pages(&self, doc_id: &str) -> PortResult<PagesResponse>;

    async fn page_image(&self, doc_id: &str, page_id: u32) -> PortResult<Bytes>;

    // --- Study Aids ---
    async fn explain_page(
        &self,
        doc_id: &str,
        page_id: u32,
        model: Option<&str>,
    ) -> PortResult<ExplanationResponse>;

    async fn ask(&self, doc_id: &str, request: &QaRequest) -> PortResult<QaResponse>;

    async fn flashcards(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<FlashcardsResponse>;

    async fn quiz(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<QuizResponse>;

    async fn cheatsheet(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<CheatsheetResponse>;

    // --- Media ---
    /// Generates audio data from a string of text.
    async fn text_to_speech(&self, text: &str) -> PortResult<AudioClip>;

    /// Transcribes an audio file into text.
    async fn speech_to_text(&self, audio: FileUpload) -> PortResult<TranscriptResponse>;
}

/// Durable home of the persisted store subset, kept under one named key.
pub trait PreferenceStorage: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    fn load(&self) -> PortResult<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> PortResult<()>;
}

/// Process-local storage, used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    pub fn snapshot(&self) -> Option<PersistedState> {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl PreferenceStorage for MemoryStorage {
    fn load(&self) -> PortResult<Option<PersistedState>> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|e| PortError::storage(e.to_string()))
    }

    fn save(&self, state: &PersistedState) -> PortResult<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| PortError::storage(e.to_string()))?;
        *guard = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_error_displays_its_message() {
        let err = PortError::http(500, "server error");
        assert_eq!(err.to_string(), "server error");
        assert_eq!(err.status, Some(500));
        assert_eq!(err.kind.to_string(), "http");
    }

    #[test]
    fn memory_storage_round_trips() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load().unwrap(), None);

        let mut state = PersistedState::default();
        state.ui.dyslexia_font = true;
        storage.save(&state).unwrap();
        assert_eq!(storage.load().unwrap(), Some(state));
    }
}
