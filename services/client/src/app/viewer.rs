//! services/client/src/app/viewer.rs
//!
//! The viewer controller. It owns the session store and the study panels,
//! issues backend requests through the `StudyApi` port and applies their
//! responses, and writes the persisted store subset through the
//! `PreferenceStorage` port whenever it changes.
//!
//! Requests are split into a `request` step that returns a `'static`
//! future and a `finish` step that applies the result. Between the two the
//! user may move to another page or document; `finish` then discards the
//! response instead of attributing it to the wrong page.

use crate::config::Config;
use crate::error::ClientError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vox_study_core::domain::{AudioClip, DocumentSession, FileUpload, PlaybackRate, TextScale};
use vox_study_core::panel::{DiscardReason, Panel, RequestTicket, Resolution};
use vox_study_core::ports::{PortError, PortResult, PreferenceStorage, StudyApi};
use vox_study_core::protocol::{
    CheatsheetResponse, ExplanationResponse, FlashcardsResponse, QaRequest, QaResponse, QuizResponse, UploadResponse,
};
use vox_study_core::store::{KeyScope, PanelKey, SessionStore};
use vox_study_core::study::{FlashcardDeck, QuizSession};

//=========================================================================================
// Requests and Outcomes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Explanation,
    Flashcards,
    Quiz,
    Cheatsheet,
    Answer,
}

impl PanelKind {
    pub fn label(self) -> &'static str {
        match self {
            PanelKind::Explanation => "explanation",
            PanelKind::Flashcards => "flashcards",
            PanelKind::Quiz => "quiz",
            PanelKind::Cheatsheet => "cheatsheet",
            PanelKind::Answer => "answer",
        }
    }
}

enum PanelResponse {
    Explanation(PortResult<ExplanationResponse>),
    Flashcards(PortResult<FlashcardsResponse>),
    Quiz(PortResult<QuizResponse>),
    Cheatsheet(PortResult<CheatsheetResponse>),
    Answer {
        question: String,
        result: PortResult<QaResponse>,
    },
}

impl PanelResponse {
    fn kind(&self) -> PanelKind {
        match self {
            PanelResponse::Explanation(_) => PanelKind::Explanation,
            PanelResponse::Flashcards(_) => PanelKind::Flashcards,
            PanelResponse::Quiz(_) => PanelKind::Quiz,
            PanelResponse::Cheatsheet(_) => PanelKind::Cheatsheet,
            PanelResponse::Answer { .. } => PanelKind::Answer,
        }
    }

    fn error(&self) -> Option<&PortError> {
        match self {
            PanelResponse::Explanation(r) => r.as_ref().err(),
            PanelResponse::Flashcards(r) => r.as_ref().err(),
            PanelResponse::Quiz(r) => r.as_ref().err(),
            PanelResponse::Cheatsheet(r) => r.as_ref().err(),
            PanelResponse::Answer { result, .. } => result.as_ref().err(),
        }
    }
}

/// A finished backend request waiting to be applied with [`Viewer::finish`].
pub struct CompletedRequest {
    ticket: RequestTicket,
    response: PanelResponse,
}

impl CompletedRequest {
    pub fn kind(&self) -> PanelKind {
        self.response.kind()
    }

    pub fn key(&self) -> &PanelKey {
        self.ticket.key()
    }
}

/// An in-flight panel request. It owns everything it needs, so the viewer
/// stays free for other interaction while it runs.
pub type PendingRequest = BoxFuture<'static, CompletedRequest>;

/// What applying a response did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(PanelKind),
    Failed(PanelKind, PortError),
    Discarded(PanelKind, DiscardReason),
    /// The backend no longer knows the document; the session was cleared.
    SessionExpired(PortError),
}

//=========================================================================================
// Viewer
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    /// Model used for this run instead of the persisted selection.
    pub model_override: Option<String>,
    pub qa_top_k: u32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            model_override: None,
            qa_top_k: crate::config::DEFAULT_QA_TOP_K,
        }
    }
}

impl From<&Config> for ViewerOptions {
    fn from(config: &Config) -> Self {
        Self {
            model_override: config.model_override.clone(),
            qa_top_k: config.qa_top_k,
        }
    }
}

pub struct Viewer {
    api: Arc<dyn StudyApi>,
    storage: Arc<dyn PreferenceStorage>,
    store: SessionStore,
    options: ViewerOptions,
    saved_revision: u64,
    /// Cancelled whenever the document session ends.
    session_token: CancellationToken,
    explanation: Panel<ExplanationResponse>,
    flashcards: Panel<FlashcardDeck>,
    quiz: Panel<QuizSession>,
    cheatsheet: Panel<String>,
    answer: Panel<QaResponse>,
}

impl Viewer {
    /// Creates a viewer, restoring persisted preferences and recent documents.
    /// Unreadable storage is logged and replaced by defaults.
    pub fn new(api: Arc<dyn StudyApi>, storage: Arc<dyn PreferenceStorage>, options: ViewerOptions) -> Self {
        let store = match storage.load() {
            Ok(Some(state)) => SessionStore::from_persisted(state),
            Ok(None) => SessionStore::new(),
            Err(e) => {
                warn!(error = %e, "Could not load saved preferences, using defaults.");
                SessionStore::new()
            }
        };
        let saved_revision = store.persisted_revision();
        Self {
            api,
            storage,
            store,
            options,
            saved_revision,
            session_token: CancellationToken::new(),
            explanation: Panel::new(),
            flashcards: Panel::new(),
            quiz: Panel::new(),
            cheatsheet: Panel::new(),
            answer: Panel::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Model sent with study-aid requests.
    pub fn effective_model(&self) -> String {
        self.options
            .model_override
            .clone()
            .unwrap_or_else(|| self.store.ui().selected_model.clone())
    }

    fn panel_key(&self, scope: KeyScope) -> Option<PanelKey> {
        let model = self.effective_model();
        self.store.panel_key(scope).map(|k| k.with_model(Some(model)))
    }

    fn current_key(&self, kind: PanelKind, page_scoped: bool) -> Option<PanelKey> {
        match kind {
            PanelKind::Answer if !page_scoped => self.panel_key(KeyScope::Document),
            _ => self.panel_key(KeyScope::Page),
        }
    }

    /// Writes the persisted subset if it changed since the last save.
    pub fn persist(&mut self) -> Result<(), ClientError> {
        let revision = self.store.persisted_revision();
        if revision == self.saved_revision {
            return Ok(());
        }
        self.storage.save(&self.store.persisted())?;
        self.saved_revision = revision;
        Ok(())
    }

    fn persist_quietly(&mut self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "Failed to save preferences.");
        }
    }

    // --- Document Lifecycle ---

    /// Uploads a file and opens the resulting document.
    ///
    /// On failure the current session, if any, is left exactly as it was.
    pub async fn upload(&mut self, file: FileUpload, name: Option<&str>) -> Result<UploadResponse, ClientError> {
        info!(file = %file.file_name, "Uploading document.");
        let uploaded = self.api.upload(file, name).await?;
        info!(doc_id = %uploaded.doc_id, pages = uploaded.page_count, "Upload complete.");

        self.store
            .add_recent_document(uploaded.doc_id.clone(), uploaded.name.clone(), uploaded.page_count);
        self.persist_quietly();
        self.open_document(&uploaded.doc_id, Some(&uploaded.name)).await?;
        Ok(uploaded)
    }

    /// Reads `path` and uploads it.
    pub async fn upload_path(&mut self, path: &Path, name: Option<&str>) -> Result<UploadResponse, ClientError> {
        let file = read_upload(path).await?;
        self.upload(file, name).await
    }

    /// Lists the document's pages and makes it the active session.
    ///
    /// A document the backend has forgotten is dropped from the recent list.
    pub async fn open_document(&mut self, doc_id: &str, name: Option<&str>) -> Result<&DocumentSession, ClientError> {
        let pages = match self.api.list_pages(doc_id).await {
            Ok(pages) => pages,
            Err(e) => {
                if e.is_document_not_found() {
                    self.expire_document(doc_id);
                }
                return Err(e.into());
            }
        };

        let name = name
            .map(str::to_string)
            .or_else(|| {
                self.store
                    .recent_documents()
                    .iter()
                    .find(|d| d.doc_id == doc_id)
                    .map(|d| d.name.clone())
            })
            .unwrap_or_else(|| format!("Document {doc_id}"));
        let page_count = pages.pages.len() as u32;
        let session = DocumentSession::new(doc_id, name.clone(), pages.pages)
            .ok_or_else(|| PortError::decode(format!("Document {doc_id} has no pages")))?;

        self.end_session();
        self.store.set_document(session);
        self.store.add_recent_document(doc_id, name, page_count);
        self.persist_quietly();
        info!(doc_id, pages = page_count, "Document opened.");

        self.store.document().ok_or(ClientError::NoDocument)
    }

    /// Closes the document and drops all panel content.
    pub fn reset(&mut self) {
        self.end_session();
        self.store.clear_document();
    }

    fn end_session(&mut self) {
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        self.explanation.reset();
        self.flashcards.reset();
        self.quiz.reset();
        self.cheatsheet.reset();
        self.answer.reset();
    }

    fn expire_document(&mut self, doc_id: &str) {
        warn!(doc_id, "Backend no longer has this document; clearing the session.");
        let is_current = self.store.document().is_some_and(|d| d.doc_id == doc_id);
        if is_current {
            self.end_session();
        }
        self.store.forget_document(doc_id);
        self.persist_quietly();
    }

    // --- Navigation ---

    pub fn go_to_page(&mut self, index: usize) -> bool {
        self.store.set_page(index)
    }

    pub fn next_page(&mut self) -> bool {
        self.store.next_page()
    }

    pub fn previous_page(&mut self) -> bool {
        self.store.previous_page()
    }

    pub fn jump_to_display_page(&mut self, display: usize) -> bool {
        self.store.jump_to_display_page(display)
    }

    // --- Panel Requests ---

    fn guard<T, F>(&self, future: F) -> BoxFuture<'static, PortResult<T>>
    where
        T: Send + 'static,
        F: std::future::Future<Output = PortResult<T>> + Send + 'static,
    {
        let token = self.session_token.clone();
        async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(PortError::cancelled()),
                result = future => result,
            }
        }
        .boxed()
    }

    /// Starts a page-scoped study request (explanation, flashcards, quiz or
    /// cheatsheet) for the current page.
    pub fn request(&mut self, kind: PanelKind) -> Result<PendingRequest, ClientError> {
        let key = self.panel_key(KeyScope::Page).ok_or(ClientError::NoDocument)?;
        let api = self.api.clone();
        let doc_id = key.doc_id.clone();
        let page_id = key.page_id.unwrap_or_default();
        let model = key.model.clone();
        debug!(panel = kind.label(), doc_id = %doc_id, page_id, "Requesting panel content.");

        let pending = match kind {
            PanelKind::Explanation => {
                let ticket = self.explanation.begin(key);
                let fut = self.guard(async move { api.explain_page(&doc_id, page_id, model.as_deref()).await });
                fut.map(move |r| CompletedRequest { ticket, response: PanelResponse::Explanation(r) }).boxed()
            }
            PanelKind::Flashcards => {
                let ticket = self.flashcards.begin(key);
                let fut = self.guard(async move { api.flashcards(&doc_id, page_id, model.as_deref()).await });
                fut.map(move |r| CompletedRequest { ticket, response: PanelResponse::Flashcards(r) }).boxed()
            }
            PanelKind::Quiz => {
                let ticket = self.quiz.begin(key);
                let fut = self.guard(async move { api.quiz(&doc_id, page_id, model.as_deref()).await });
                fut.map(move |r| CompletedRequest { ticket, response: PanelResponse::Quiz(r) }).boxed()
            }
            PanelKind::Cheatsheet => {
                let ticket = self.cheatsheet.begin(key);
                let fut = self.guard(async move { api.cheatsheet(&doc_id, page_id, model.as_deref()).await });
                fut.map(move |r| CompletedRequest { ticket, response: PanelResponse::Cheatsheet(r) }).boxed()
            }
            PanelKind::Answer => {
                return Err(PortError::invalid_input("Questions are sent with request_answer").into());
            }
        };
        Ok(pending)
    }

    /// Starts a question. With `page_scoped` the current page is sent along and
    /// the answer belongs to that page.
    pub fn request_answer(&mut self, question: &str, page_scoped: bool) -> Result<PendingRequest, ClientError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(PortError::invalid_input("Please enter a question").into());
        }
        let key = self
            .current_key(PanelKind::Answer, page_scoped)
            .ok_or(ClientError::NoDocument)?;

        let request = QaRequest {
            question: question.clone(),
            k: Some(self.options.qa_top_k),
            page_id: key.page_id,
            model: key.model.clone(),
        };
        let doc_id = key.doc_id.clone();
        let api = self.api.clone();
        let ticket = self.answer.begin(key);
        let fut = self.guard(async move { api.ask(&doc_id, &request).await });
        Ok(fut
            .map(move |result| CompletedRequest {
                ticket,
                response: PanelResponse::Answer { question, result },
            })
            .boxed())
    }

    /// Applies a finished request to its panel if it is still current.
    pub fn finish(&mut self, completed: CompletedRequest) -> Outcome {
        let kind = completed.kind();
        let CompletedRequest { ticket, response } = completed;

        if let Some(e) = response.error().filter(|e| e.is_document_not_found()).cloned() {
            self.expire_document(&ticket.key().doc_id);
            return Outcome::SessionExpired(e);
        }

        let page_scoped = ticket.key().page_id.is_some();
        let current = self.current_key(kind, page_scoped);
        let current = current.as_ref();

        let resolution = match response {
            PanelResponse::Explanation(r) => self.explanation.resolve(ticket, r, current),
            PanelResponse::Flashcards(r) => {
                self.flashcards
                    .resolve(ticket, r.map(|r| FlashcardDeck::new(r.items)), current)
            }
            PanelResponse::Quiz(r) => self.quiz.resolve(ticket, r.map(|r| QuizSession::new(r.items)), current),
            PanelResponse::Cheatsheet(r) => self.cheatsheet.resolve(ticket, r.map(|r| r.content), current),
            PanelResponse::Answer { question, result } => {
                let recorded = result
                    .as_ref()
                    .ok()
                    .map(|qa| (question, qa.answer.clone(), qa.citation_pages()));
                let resolution = self.answer.resolve(ticket, result, current);
                if let (Resolution::Applied, Some((question, answer, citations))) = (&resolution, recorded) {
                    self.store.set_qa(question, answer, citations);
                }
                resolution
            }
        };

        match resolution {
            Resolution::Applied => Outcome::Applied(kind),
            Resolution::Failed(e) => Outcome::Failed(kind, e),
            Resolution::Discarded(reason) => {
                debug!(panel = kind.label(), ?reason, "Response discarded.");
                Outcome::Discarded(kind, reason)
            }
        }
    }

    /// Requests and applies in one step.
    pub async fn load(&mut self, kind: PanelKind) -> Result<Outcome, ClientError> {
        let pending = self.request(kind)?;
        Ok(self.finish(pending.await))
    }

    pub async fn ask(&mut self, question: &str, page_scoped: bool) -> Result<Outcome, ClientError> {
        let pending = self.request_answer(question, page_scoped)?;
        Ok(self.finish(pending.await))
    }

    /// Whether the panel has neither content nor a pending request for the
    /// current page.
    pub fn needs_load(&self, kind: PanelKind) -> bool {
        let Some(key) = self.current_key(kind, true) else {
            return false;
        };
        match kind {
            PanelKind::Explanation => self.explanation.needs_load(&key),
            PanelKind::Flashcards => self.flashcards.needs_load(&key),
            PanelKind::Quiz => self.quiz.needs_load(&key),
            PanelKind::Cheatsheet => self.cheatsheet.needs_load(&key),
            PanelKind::Answer => false,
        }
    }

    // --- Panel Content ---

    pub fn explanation(&self) -> Option<&ExplanationResponse> {
        let key = self.panel_key(KeyScope::Page)?;
        self.explanation.content_for(&key)
    }

    pub fn flashcards_mut(&mut self) -> Option<&mut FlashcardDeck> {
        let key = self.panel_key(KeyScope::Page)?;
        self.flashcards.content_for_mut(&key)
    }

    pub fn quiz_mut(&mut self) -> Option<&mut QuizSession> {
        let key = self.panel_key(KeyScope::Page)?;
        self.quiz.content_for_mut(&key)
    }

    pub fn cheatsheet(&self) -> Option<&str> {
        let key = self.panel_key(KeyScope::Page)?;
        self.cheatsheet.content_for(&key).map(String::as_str)
    }

    pub fn answer(&self, page_scoped: bool) -> Option<&QaResponse> {
        let key = self.current_key(PanelKind::Answer, page_scoped)?;
        self.answer.content_for(&key)
    }

    // --- Media ---

    /// Synthesizes `text` and makes it the active audio clip, releasing the
    /// previous one.
    pub async fn speak(&mut self, text: &str) -> Result<&AudioClip, ClientError> {
        if text.trim().is_empty() {
            return Err(PortError::invalid_input("Nothing to read aloud").into());
        }
        let clip = self.api.text_to_speech(text).await?;
        if let Some(previous) = self.store.set_audio_clip(clip) {
            debug!(bytes = previous.len(), "Released previous audio clip.");
        }
        self.store
            .audio()
            .clip
            .as_ref()
            .ok_or_else(|| PortError::decode("Text-to-speech returned no audio").into())
    }

    pub fn set_audio_rate(&mut self, rate: PlaybackRate) {
        self.store.set_audio_rate(rate);
    }

    pub fn set_audio_playing(&mut self, playing: bool) {
        self.store.set_audio_playing(playing);
    }

    /// Transcribes an audio file.
    pub async fn transcribe(&self, path: &Path) -> Result<String, ClientError> {
        let file = read_upload(path).await?;
        let transcript = self.api.speech_to_text(file).await?;
        Ok(transcript.text)
    }

    pub async fn page_image(&mut self) -> Result<bytes::Bytes, ClientError> {
        let key = self.panel_key(KeyScope::Page).ok_or(ClientError::NoDocument)?;
        let page_id = key.page_id.unwrap_or_default();
        match self.api.page_image(&key.doc_id, page_id).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                if e.is_document_not_found() {
                    self.expire_document(&key.doc_id);
                }
                Err(e.into())
            }
        }
    }

    // --- Preferences ---

    pub fn toggle_theme(&mut self) -> Result<(), ClientError> {
        self.store.toggle_theme();
        self.persist()
    }

    pub fn toggle_dyslexia_font(&mut self) -> Result<(), ClientError> {
        self.store.toggle_dyslexia_font();
        self.persist()
    }

    pub fn toggle_high_contrast(&mut self) -> Result<(), ClientError> {
        self.store.toggle_high_contrast();
        self.persist()
    }

    pub fn set_text_scale(&mut self, scale: TextScale) -> Result<(), ClientError> {
        self.store.set_text_scale(scale);
        self.persist()
    }

    /// Rejects unsupported percentages without touching stored state.
    pub fn set_text_scale_percent(&mut self, percent: u16) -> Result<(), ClientError> {
        self.store.set_text_scale_percent(percent)?;
        self.persist()
    }

    pub fn set_selected_model(&mut self, model: &str) -> Result<(), ClientError> {
        self.store.set_selected_model(model);
        self.persist()
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Guesses a MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "webm" => "audio/webm",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Reads a local file into an upload. A refused read maps to `PermissionDenied`.
pub async fn read_upload(path: &Path) -> Result<FileUpload, ClientError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| -> ClientError {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                PortError::permission_denied(format!("Permission denied reading {}", path.display())).into()
            }
            _ => e.into(),
        }
    })?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(FileUpload::new(file_name, content_type_for(path), bytes))
}
