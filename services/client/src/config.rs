//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Command-line flags may override values
//! after loading.

use std::path::PathBuf;
use tracing::Level;

/// Backend used when `VOX_API_BASE` is not set.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Number of passages the backend retrieves for a question unless configured.
pub const DEFAULT_QA_TOP_K: u32 = 3;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub log_level: Level,
    /// Directory holding the persisted preferences. `None` means the platform
    /// data directory.
    pub state_dir: Option<PathBuf>,
    /// Model that overrides the persisted selection for this run only.
    pub model_override: Option<String>,
    pub qa_top_k: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            log_level: Level::WARN,
            state_dir: None,
            model_override: None,
            qa_top_k: DEFAULT_QA_TOP_K,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend ---
        let api_base = lookup("VOX_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = normalize_base_url(&api_base)
            .ok_or_else(|| ConfigError::InvalidValue("VOX_API_BASE".to_string(), api_base.clone()))?;

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage and Study Settings ---
        let state_dir = lookup("VOX_STATE_DIR").filter(|s| !s.trim().is_empty()).map(PathBuf::from);

        let model_override = lookup("VOX_DEFAULT_MODEL").filter(|s| !s.trim().is_empty());

        let qa_top_k = match lookup("VOX_QA_TOP_K") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|k| *k > 0)
                .ok_or_else(|| ConfigError::InvalidValue("VOX_QA_TOP_K".to_string(), raw.clone()))?,
            None => DEFAULT_QA_TOP_K,
        };

        Ok(Self {
            api_base,
            log_level,
            state_dir,
            model_override,
            qa_top_k,
        })
    }
}

/// Trims trailing slashes and checks for an http(s) scheme.
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let has_host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    has_host.then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.log_level, Level::WARN);
        assert_eq!(config.qa_top_k, DEFAULT_QA_TOP_K);
        assert!(config.state_dir.is_none());
        assert!(config.model_override.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("VOX_API_BASE", "https://tutor.example.com/"),
            ("RUST_LOG", "debug"),
            ("VOX_STATE_DIR", "/tmp/vox"),
            ("VOX_DEFAULT_MODEL", "gemini-1.5-pro"),
            ("VOX_QA_TOP_K", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_base, "https://tutor.example.com");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/vox")));
        assert_eq!(config.model_override.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.qa_top_k, 5);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("VOX_API_BASE", "localhost:8000")])),
            Err(ConfigError::InvalidValue(var, _)) if var == "VOX_API_BASE"
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("RUST_LOG", "loud")])),
            Err(ConfigError::InvalidValue(var, _)) if var == "RUST_LOG"
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("VOX_QA_TOP_K", "0")])),
            Err(ConfigError::InvalidValue(var, _)) if var == "VOX_QA_TOP_K"
        ));
    }
}
