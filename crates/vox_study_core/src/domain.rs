//! crates/vox_study_core/src/domain.rs
//!
//! Defines the core data structures of the study client: the document session,
//! accessibility preferences, audio playback state, the Q&A scratch record and
//! the recent-document list.
//! These structs are independent of any transport or storage backend.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Model used for explanations and study aids until the user picks another.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Models offered by the model selector.
pub const KNOWN_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro"];

/// Upper bound of the recent-document list.
pub const MAX_RECENT_DOCUMENTS: usize = 10;

//=========================================================================================
// Document Session
//=========================================================================================

/// A single page as identified by the backend. Page ids are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub page_id: u32,
}

/// The client's working reference to one uploaded document and its viewing position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSession {
    pub doc_id: String,
    pub name: String,
    pages: Vec<Page>,
    current: usize,
}

impl DocumentSession {
    /// Creates a session positioned on the first page.
    ///
    /// Returns `None` for a document without pages, since there would be no
    /// valid current position.
    pub fn new(doc_id: impl Into<String>, name: impl Into<String>, pages: Vec<Page>) -> Option<Self> {
        if pages.is_empty() {
            return None;
        }
        Some(Self {
            doc_id: doc_id.into(),
            name: name.into(),
            pages,
            current: 0,
        })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> Page {
        self.pages[self.current]
    }

    /// Moves to `index`. Out-of-range indices leave the position unchanged.
    pub(crate) fn set_current(&mut self, index: usize) -> bool {
        if index >= self.pages.len() || index == self.current {
            return false;
        }
        self.current = index;
        true
    }

    /// Human-facing position, e.g. `Page 3 of 12`.
    pub fn position_label(&self) -> String {
        format!("Page {} of {}", self.current + 1, self.pages.len())
    }
}

//=========================================================================================
// UI Preferences
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Error returned when a text scale outside the supported set is requested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported text scale {0}%, expected one of 100, 115, 130")]
pub struct InvalidTextScale(pub u16);

/// Text scale in percent. Only the three enumerated steps are representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum TextScale {
    #[default]
    Normal,
    Large,
    ExtraLarge,
}

impl TextScale {
    pub const ALL: [TextScale; 3] = [TextScale::Normal, TextScale::Large, TextScale::ExtraLarge];

    pub fn percent(self) -> u16 {
        match self {
            TextScale::Normal => 100,
            TextScale::Large => 115,
            TextScale::ExtraLarge => 130,
        }
    }
}

impl TryFrom<u16> for TextScale {
    type Error = InvalidTextScale;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            100 => Ok(TextScale::Normal),
            115 => Ok(TextScale::Large),
            130 => Ok(TextScale::ExtraLarge),
            other => Err(InvalidTextScale(other)),
        }
    }
}

impl From<TextScale> for u16 {
    fn from(scale: TextScale) -> Self {
        scale.percent()
    }
}

/// Long-lived accessibility and model preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    #[serde(deserialize_with = "or_default")]
    pub theme: Theme,
    #[serde(deserialize_with = "or_default")]
    pub dyslexia_font: bool,
    #[serde(deserialize_with = "or_default")]
    pub text_scale: TextScale,
    #[serde(deserialize_with = "or_default")]
    pub high_contrast: bool,
    #[serde(deserialize_with = "or_default_model")]
    pub selected_model: String,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            dyslexia_font: false,
            text_scale: TextScale::Normal,
            high_contrast: false,
            selected_model: DEFAULT_MODEL.to_string(),
        }
    }
}

//=========================================================================================
// Audio
//=========================================================================================

/// An audio payload returned by text-to-speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Bytes,
    pub content_type: String,
}

impl AudioClip {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the content type, used when saving the clip.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            _ => "mp3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported playback rate {0}")]
pub struct InvalidPlaybackRate(pub String);

/// Playback speeds offered by the audio player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackRate {
    #[default]
    Normal,
    Fast,
    Faster,
}

impl PlaybackRate {
    pub const ALL: [PlaybackRate; 3] = [PlaybackRate::Normal, PlaybackRate::Fast, PlaybackRate::Faster];

    pub fn factor(self) -> f32 {
        match self {
            PlaybackRate::Normal => 1.0,
            PlaybackRate::Fast => 1.25,
            PlaybackRate::Faster => 1.5,
        }
    }
}

impl std::str::FromStr for PlaybackRate {
    type Err = InvalidPlaybackRate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f32 = s
            .trim()
            .trim_end_matches('x')
            .parse()
            .map_err(|_| InvalidPlaybackRate(s.to_string()))?;
        PlaybackRate::ALL
            .into_iter()
            .find(|rate| (rate.factor() - value).abs() < f32::EPSILON)
            .ok_or_else(|| InvalidPlaybackRate(s.to_string()))
    }
}

/// Ephemeral playback state. At most one clip is held at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioState {
    pub clip: Option<AudioClip>,
    pub rate: PlaybackRate,
    pub playing: bool,
}

//=========================================================================================
// Q&A and Recent Documents
//=========================================================================================

/// The most recent question and its answer. Overwritten by each new answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QaRecord {
    pub last_question: Option<String>,
    pub last_answer: Option<String>,
    pub citations: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentDocument {
    pub doc_id: String,
    pub name: String,
    pub page_count: u32,
    pub last_visited: DateTime<Utc>,
}

/// The subset of the store that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    #[serde(deserialize_with = "or_default")]
    pub ui: UiPreferences,
    #[serde(deserialize_with = "skip_invalid")]
    pub recent_docs: Vec<RecentDocument>,
}

// --- Lenient loading ---
// A bad value in the saved file costs that value only, never the whole file.

fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring invalid saved value.");
        T::default()
    }))
}

fn or_default_model<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(model) if !model.trim().is_empty() => model,
        _ => DEFAULT_MODEL.to_string(),
    })
}

fn skip_invalid<'de, D>(deserializer: D) -> Result<Vec<RecentDocument>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(entries) => entries,
        _ => return Ok(Vec::new()),
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| RecentDocument::deserialize(entry).ok())
        .collect())
}

//=========================================================================================
// Uploads
//=========================================================================================

/// A file handed to the backend as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_scale_accepts_only_enumerated_values() {
        assert_eq!(TextScale::try_from(115), Ok(TextScale::Large));
        assert_eq!(TextScale::try_from(142), Err(InvalidTextScale(142)));
    }

    #[test]
    fn text_scale_serializes_as_percent() {
        let json = serde_json::to_string(&TextScale::ExtraLarge).unwrap();
        assert_eq!(json, "130");
        assert!(serde_json::from_str::<TextScale>("142").is_err());
    }

    #[test]
    fn invalid_saved_fields_fall_back_one_by_one() {
        let json = r#"{
            "ui": { "theme": "dark", "text_scale": 142, "high_contrast": "yes", "selected_model": "" },
            "recent_docs": [
                { "doc_id": "d1", "name": "Lecture", "page_count": 4, "last_visited": "2024-05-01T10:00:00Z" },
                { "doc_id": "d2" }
            ]
        }"#;
        let state: PersistedState = serde_json::from_str(json).unwrap();

        assert_eq!(state.ui.theme, Theme::Dark);
        assert_eq!(state.ui.text_scale, TextScale::Normal);
        assert!(!state.ui.high_contrast);
        assert_eq!(state.ui.selected_model, DEFAULT_MODEL);
        assert_eq!(state.recent_docs.len(), 1);
        assert_eq!(state.recent_docs[0].doc_id, "d1");
    }

    #[test]
    fn document_session_requires_pages() {
        assert!(DocumentSession::new("doc", "Deck", vec![]).is_none());
        let session = DocumentSession::new("doc", "Deck", vec![Page { page_id: 0 }]).unwrap();
        assert_eq!(session.position_label(), "Page 1 of 1");
    }

    #[test]
    fn playback_rate_parses_labels() {
        assert_eq!("1.25x".parse::<PlaybackRate>(), Ok(PlaybackRate::Fast));
        assert_eq!("1.5".parse::<PlaybackRate>(), Ok(PlaybackRate::Faster));
        assert!("2.0".parse::<PlaybackRate>().is_err());
    }

    #[test]
    fn persisted_state_fills_missing_fields() {
        let state: PersistedState = serde_json::from_str(r#"{"ui":{"theme":"dark"}}"#).unwrap();
        assert_eq!(state.ui.theme, Theme::Dark);
        assert_eq!(state.ui.selected_model, DEFAULT_MODEL);
        assert!(state.recent_docs.is_empty());
    }
}
