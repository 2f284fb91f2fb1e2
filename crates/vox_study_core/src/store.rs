//! crates/vox_study_core/src/store.rs
//!
//! The session store: the single owner of the active document session, UI
//! preferences, audio state, the Q&A record and the recent-document list.
//!
//! The store is a plain value. Whoever drives the UI owns it and passes it
//! around explicitly; there is no global instance. Every operation is
//! synchronous and infallible from the caller's point of view: input that
//! does not make sense for the current state is ignored.

use crate::domain::{
    AudioClip, AudioState, DocumentSession, InvalidTextScale, PersistedState, PlaybackRate, QaRecord,
    RecentDocument, TextScale, UiPreferences, MAX_RECENT_DOCUMENTS,
};
use chrono::{DateTime, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use tracing::debug;

//=========================================================================================
// Events and Panel Identity
//=========================================================================================

/// Change notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    DocumentChanged { doc_id: Option<String> },
    PageChanged { index: usize },
    PreferencesChanged,
    AudioChanged,
    QaChanged,
    RecentsChanged,
}

/// Which identifiers a panel's content depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Content belongs to one page of the document (explanation, study aids).
    Page,
    /// Content belongs to the document as a whole (question answering).
    Document,
}

/// The identity a panel request was issued for. A response is only valid while
/// the store still reports the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PanelKey {
    pub doc_id: String,
    pub page_id: Option<u32>,
    pub model: Option<String>,
}

impl PanelKey {
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

//=========================================================================================
// SessionStore
//=========================================================================================

#[derive(Debug, Default)]
pub struct SessionStore {
    document: Option<DocumentSession>,
    ui: UiPreferences,
    audio: AudioState,
    qa: QaRecord,
    recent_docs: Vec<RecentDocument>,
    persisted_revision: u64,
    subscribers: Vec<UnboundedSender<StoreEvent>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from previously persisted state. Recent entries beyond
    /// the cap and duplicate ids are dropped.
    pub fn from_persisted(state: PersistedState) -> Self {
        let mut store = Self::new();
        store.restore(state);
        store
    }

    /// Registers a subscriber. The receiver sees every change made after this call.
    pub fn subscribe(&mut self) -> UnboundedReceiver<StoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    fn touch_persisted(&mut self) {
        self.persisted_revision = self.persisted_revision.wrapping_add(1);
    }

    // --- Document Session ---

    pub fn document(&self) -> Option<&DocumentSession> {
        self.document.as_ref()
    }

    pub fn set_document(&mut self, session: DocumentSession) {
        let doc_id = session.doc_id.clone();
        debug!(doc_id = %doc_id, pages = session.page_count(), "Document session set.");
        self.document = Some(session);
        self.emit(StoreEvent::DocumentChanged { doc_id: Some(doc_id) });
    }

    pub fn clear_document(&mut self) {
        if self.document.take().is_some() {
            self.emit(StoreEvent::DocumentChanged { doc_id: None });
        }
    }

    /// Moves to the 0-based page `index`. Returns whether the position changed.
    /// Without a document, or with an out-of-range index, nothing happens.
    pub fn set_page(&mut self, index: usize) -> bool {
        let changed = match self.document.as_mut() {
            Some(doc) => doc.set_current(index),
            None => false,
        };
        if changed {
            self.emit(StoreEvent::PageChanged { index });
        }
        changed
    }

    pub fn next_page(&mut self) -> bool {
        match self.document.as_ref().map(|d| d.current_index()) {
            Some(current) => self.set_page(current + 1),
            None => false,
        }
    }

    pub fn previous_page(&mut self) -> bool {
        match self.document.as_ref().map(|d| d.current_index()) {
            Some(current) if current > 0 => self.set_page(current - 1),
            _ => false,
        }
    }

    /// Jumps to a page given as the user sees it (1-based).
    pub fn jump_to_display_page(&mut self, display: usize) -> bool {
        match display.checked_sub(1) {
            Some(index) => self.set_page(index),
            None => false,
        }
    }

    // --- UI Preferences ---

    pub fn ui(&self) -> &UiPreferences {
        &self.ui
    }

    fn preferences_changed(&mut self) {
        self.touch_persisted();
        self.emit(StoreEvent::PreferencesChanged);
    }

    pub fn toggle_theme(&mut self) {
        self.ui.theme = self.ui.theme.toggled();
        self.preferences_changed();
    }

    pub fn toggle_dyslexia_font(&mut self) {
        self.ui.dyslexia_font = !self.ui.dyslexia_font;
        self.preferences_changed();
    }

    pub fn toggle_high_contrast(&mut self) {
        self.ui.high_contrast = !self.ui.high_contrast;
        self.preferences_changed();
    }

    pub fn set_text_scale(&mut self, scale: TextScale) {
        if self.ui.text_scale != scale {
            self.ui.text_scale = scale;
            self.preferences_changed();
        }
    }

    /// Sets the text scale from a raw percentage. Values outside the supported
    /// set are rejected and the stored scale is left as it was.
    pub fn set_text_scale_percent(&mut self, percent: u16) -> Result<(), InvalidTextScale> {
        let scale = TextScale::try_from(percent)?;
        self.set_text_scale(scale);
        Ok(())
    }

    /// Selects the AI model used for later requests. Blank names are ignored.
    pub fn set_selected_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        let model = model.trim();
        if model.is_empty() || model == self.ui.selected_model {
            return;
        }
        self.ui.selected_model = model.to_string();
        self.preferences_changed();
    }

    // --- Audio ---

    pub fn audio(&self) -> &AudioState {
        &self.audio
    }

    /// Replaces the active clip and returns the previous one, which the caller
    /// should drop to release it. Playback of the old clip ends here.
    pub fn set_audio_clip(&mut self, clip: AudioClip) -> Option<AudioClip> {
        let previous = self.audio.clip.replace(clip);
        self.audio.playing = false;
        self.emit(StoreEvent::AudioChanged);
        previous
    }

    pub fn clear_audio(&mut self) -> Option<AudioClip> {
        let previous = self.audio.clip.take();
        self.audio.playing = false;
        if previous.is_some() {
            self.emit(StoreEvent::AudioChanged);
        }
        previous
    }

    pub fn set_audio_rate(&mut self, rate: PlaybackRate) {
        if self.audio.rate != rate {
            self.audio.rate = rate;
            self.emit(StoreEvent::AudioChanged);
        }
    }

    /// Ignored while no clip is loaded.
    pub fn set_audio_playing(&mut self, playing: bool) {
        if self.audio.clip.is_none() || self.audio.playing == playing {
            return;
        }
        self.audio.playing = playing;
        self.emit(StoreEvent::AudioChanged);
    }

    // --- Q&A ---

    pub fn qa(&self) -> &QaRecord {
        &self.qa
    }

    pub fn set_qa(&mut self, question: impl Into<String>, answer: impl Into<String>, citations: Vec<u32>) {
        self.qa = QaRecord {
            last_question: Some(question.into()),
            last_answer: Some(answer.into()),
            citations,
        };
        self.emit(StoreEvent::QaChanged);
    }

    // --- Recent Documents ---

    pub fn recent_documents(&self) -> &[RecentDocument] {
        &self.recent_docs
    }

    pub fn add_recent_document(&mut self, doc_id: impl Into<String>, name: impl Into<String>, page_count: u32) {
        self.add_recent_document_at(doc_id, name, page_count, Utc::now());
    }

    /// Puts the document at the front of the list with the given visit time.
    /// An existing entry with the same id is replaced rather than duplicated.
    pub fn add_recent_document_at(
        &mut self,
        doc_id: impl Into<String>,
        name: impl Into<String>,
        page_count: u32,
        visited: DateTime<Utc>,
    ) {
        let doc_id = doc_id.into();
        self.recent_docs.retain(|d| d.doc_id != doc_id);
        self.recent_docs.insert(
            0,
            RecentDocument {
                doc_id,
                name: name.into(),
                page_count,
                last_visited: visited,
            },
        );
        self.recent_docs.truncate(MAX_RECENT_DOCUMENTS);
        self.touch_persisted();
        self.emit(StoreEvent::RecentsChanged);
    }

    /// Drops every trace of a document the backend no longer knows: the
    /// recent entry and, if it is the open one, the session itself.
    pub fn forget_document(&mut self, doc_id: &str) {
        let before = self.recent_docs.len();
        self.recent_docs.retain(|d| d.doc_id != doc_id);
        if self.recent_docs.len() != before {
            self.touch_persisted();
            self.emit(StoreEvent::RecentsChanged);
        }
        if self.document.as_ref().is_some_and(|d| d.doc_id == doc_id) {
            self.clear_document();
        }
    }

    // --- Persistence ---

    /// Counter that changes whenever the persisted subset changes.
    pub fn persisted_revision(&self) -> u64 {
        self.persisted_revision
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            ui: self.ui.clone(),
            recent_docs: self.recent_docs.clone(),
        }
    }

    pub fn restore(&mut self, state: PersistedState) {
        self.ui = state.ui;
        let mut recents: Vec<RecentDocument> = Vec::with_capacity(MAX_RECENT_DOCUMENTS);
        for doc in state.recent_docs {
            if recents.len() == MAX_RECENT_DOCUMENTS {
                break;
            }
            if !recents.iter().any(|d| d.doc_id == doc.doc_id) {
                recents.push(doc);
            }
        }
        self.recent_docs = recents;
        self.emit(StoreEvent::PreferencesChanged);
        self.emit(StoreEvent::RecentsChanged);
    }

    // --- Panel Identity ---

    /// The key a panel request issued right now would belong to, using the
    /// selected model. `None` without a document.
    pub fn panel_key(&self, scope: KeyScope) -> Option<PanelKey> {
        let doc = self.document.as_ref()?;
        let page_id = match scope {
            KeyScope::Page => Some(doc.current_page().page_id),
            KeyScope::Document => None,
        };
        Some(PanelKey {
            doc_id: doc.doc_id.clone(),
            page_id,
            model: Some(self.ui.selected_model.clone()),
        })
    }
}
