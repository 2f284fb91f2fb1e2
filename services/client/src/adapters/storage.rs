//! services/client/src/adapters/storage.rs
//!
//! File-backed implementation of the `PreferenceStorage` port. The persisted
//! store subset (UI preferences and recent documents) lives in one JSON file
//! named after the storage key.

use directories::ProjectDirs;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vox_study_core::domain::PersistedState;
use vox_study_core::ports::{PortError, PortResult, PreferenceStorage};

/// Name under which the persisted state is stored.
pub const STORAGE_KEY: &str = "ai-tutor-storage";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize preferences: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not determine a data directory for this platform")]
    NoDataDir,
}

impl From<StorageError> for PortError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
                PortError::permission_denied(err.to_string())
            }
            _ => PortError::storage(err.to_string()),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Stores state in `<dir>/ai-tutor-storage.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// Uses the platform data directory, e.g. `~/.local/share/vox-study`.
    pub fn platform_default() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("", "", "vox-study").ok_or(StorageError::NoDataDir)?;
        Ok(Self::in_dir(dirs.data_dir()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<Option<PersistedState>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // An unreadable file is treated as absent so the client still starts.
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt preference file.");
                Ok(None)
            }
        }
    }

    /// Writes to a temporary sibling and renames it over the target.
    fn write(&self, state: &PersistedState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| self.io_error(e))?;
            file.write_all(json.as_bytes()).map_err(|e| self.io_error(e))?;
            file.sync_all().map_err(|e| self.io_error(e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "Preferences saved.");
        Ok(())
    }
}

//=========================================================================================
// `PreferenceStorage` Trait Implementation
//=========================================================================================

impl PreferenceStorage for JsonFileStorage {
    fn load(&self) -> PortResult<Option<PersistedState>> {
        Ok(self.read()?)
    }

    fn save(&self, state: &PersistedState) -> PortResult<()> {
        Ok(self.write(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vox_study_core::domain::{TextScale, Theme};
    use vox_study_core::store::SessionStore;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::in_dir(dir.path());
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn preferences_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::in_dir(dir.path().join("nested"));

        let mut store = SessionStore::new();
        store.toggle_theme();
        store.set_text_scale(TextScale::ExtraLarge);
        store.set_selected_model("gemini-1.5-pro");
        store.add_recent_document("doc-1", "Lecture 1", 12);
        storage.save(&store.persisted()).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded, store.persisted());
        assert_eq!(loaded.ui.theme, Theme::Dark);
        assert!(storage.path().ends_with("ai-tutor-storage.json"));
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::in_dir(dir.path());
        fs::write(storage.path(), "{ not json").unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn bad_text_scale_keeps_the_recent_documents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::in_dir(dir.path());
        fs::write(
            storage.path(),
            r#"{"ui":{"text_scale":142,"dyslexia_font":true},"recent_docs":[{"doc_id":"d1","name":"Lecture","page_count":3,"last_visited":"2024-05-01T10:00:00Z"}]}"#,
        )
        .unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.ui.text_scale, TextScale::Normal);
        assert!(loaded.ui.dyslexia_font);
        assert_eq!(loaded.recent_docs.len(), 1);
        assert_eq!(loaded.recent_docs[0].doc_id, "d1");
    }
}
