//! Journal runtime configuration.
//!
//! # Responsibility
//! - Describe which storage backend to open and how to log.
//! - Load settings from a JSON file, falling back to defaults.
//!
//! # Invariants
//! - A missing config file yields `JournalConfig::default()`.
//! - A present but malformed file is an error, never silently replaced.

use crate::logging::{default_log_level, init_logging};
use crate::repo::local_file_repo::DEFAULT_BLOB_FILE_NAME;
use crate::service::item_store::TodayView;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default SQLite file name inside a data directory.
pub const DEFAULT_DB_FILE_NAME: &str = "bujo.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Durable SQLite database file.
    Sqlite { path: PathBuf },
    /// Whole collection in one JSON file.
    LocalFile { path: PathBuf },
}

impl BackendConfig {
    pub fn path(&self) -> &Path {
        match self {
            Self::Sqlite { path } | Self::LocalFile { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::LocalFile { .. } => "local_file",
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::LocalFile {
            path: PathBuf::from(DEFAULT_BLOB_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub backend: BackendConfig,
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub today_view: TodayView,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            today_view: TodayView::default(),
        }
    }
}

impl JournalConfig {
    /// Loads config from `path`, or defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ConfigError::Io(err)),
        };
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.path().as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{} backend path must not be empty",
                self.backend.kind()
            )));
        }
        if let Some(log_dir) = &self.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    log_dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Starts file logging when `log_dir` is configured.
    ///
    /// Returns `Ok(false)` when logging is not configured.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        let log_dir = log_dir.to_str().ok_or_else(|| {
            ConfigError::Invalid(format!("log_dir is not valid UTF-8: {}", log_dir.display()))
        })?;
        init_logging(&self.log_level, log_dir).map_err(ConfigError::Invalid)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendConfig, ConfigError, JournalConfig};
    use crate::service::item_store::TodayView;
    use std::path::PathBuf;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, JournalConfig::default());
        assert_eq!(config.today_view, TodayView::Inclusive);
    }

    #[test]
    fn parses_tagged_backend_and_partial_fields() {
        let config = JournalConfig::from_json(
            r#"{
                "backend": { "kind": "sqlite", "path": "/var/lib/bujo/journal.sqlite3" },
                "today_view": "strict"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                path: PathBuf::from("/var/lib/bujo/journal.sqlite3")
            }
        );
        assert_eq!(config.today_view, TodayView::Strict);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn rejects_relative_log_dir_and_unknown_backend() {
        let relative = JournalConfig::from_json(r#"{ "log_dir": "logs" }"#).unwrap_err();
        assert!(matches!(relative, ConfigError::Invalid(message) if message.contains("absolute")));

        let unknown =
            JournalConfig::from_json(r#"{ "backend": { "kind": "postgres", "path": "x" } }"#)
                .unwrap_err();
        assert!(matches!(unknown, ConfigError::Parse(_)));
    }

    #[test]
    fn init_logging_is_skipped_without_log_dir() {
        assert!(!JournalConfig::default().init_logging().unwrap());
    }
}
