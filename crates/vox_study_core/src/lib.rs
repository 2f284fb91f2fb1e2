pub mod domain;
pub mod panel;
pub mod ports;
pub mod protocol;
pub mod store;
pub mod study;

pub use domain::{
    AudioClip, AudioState, DocumentSession, FileUpload, Page, PersistedState, PlaybackRate, QaRecord,
    RecentDocument, TextScale, Theme, UiPreferences,
};
pub use panel::{DiscardReason, Panel, PanelStatus, RequestTicket, Resolution};
pub use ports::{ErrorKind, MemoryStorage, PortError, PortResult, PreferenceStorage, StudyApi};
pub use store::{KeyScope, PanelKey, SessionStore, StoreEvent};
pub use study::{FlashcardDeck, QuizError, QuizSession, QuizVerdict, Zoom};
