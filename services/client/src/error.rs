//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::adapters::storage::StorageError;
use crate::config::ConfigError;
use vox_study_core::domain::{InvalidPlaybackRate, InvalidTextScale};
use vox_study_core::ports::PortError;
use vox_study_core::study::QuizError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// Represents a failure reading or writing persisted preferences.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Represents a standard Input/Output error (e.g., reading an upload or writing audio).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    TextScale(#[from] InvalidTextScale),

    #[error("{0}")]
    PlaybackRate(#[from] InvalidPlaybackRate),

    #[error("{0}")]
    Quiz(#[from] QuizError),

    /// The command needs an open document and none could be resolved.
    #[error("No document selected. Upload one or pass --doc <id>.")]
    NoDocument,

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl ClientError {
    /// The port error behind this failure, if any.
    pub fn port(&self) -> Option<&PortError> {
        match self {
            ClientError::Port(e) => Some(e),
            _ => None,
        }
    }
}
