//! Error taxonomy for configuration resolution.
//!
//! Absence (`KeyNotFound`) and shape mismatch (`WrongType`) are deliberately
//! separate variants: defaulted accessors suppress the former and always
//! propagate the latter.

use std::path::PathBuf;
use thiserror::Error;

/// All errors surfaced by the resolution engine and its collaborators.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A dot-path segment does not exist in the tree.
    #[error("key not found: '{segment}' in path '{path}'")]
    KeyNotFound { path: String, segment: String },

    /// Traversal was attempted through a non-container value.
    #[error("cannot traverse into {actual} (expected {expected}) at path '{path}'")]
    WrongType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Mandatory keys are absent after the full merge. Carries the complete
    /// list, never just the first.
    #[error("missing mandatory configuration keys: [{}]", quote_keys(.keys))]
    MissingMandatory { keys: Vec<String> },

    /// Configuration file does not exist.
    #[error("configuration file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// Configuration file exists but could not be parsed.
    #[error("parse error in '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// File extension is neither `.json` nor `.toml`.
    #[error("unsupported config file extension '{extension}' for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// A `Config` can only be built around an object root.
    #[error("configuration root must be an object, got {actual}")]
    NonObjectRoot { actual: &'static str },

    /// Failed to serialize a tree back to text.
    #[error("failed to render configuration: {0}")]
    Render(String),

    /// I/O failure other than file-not-found.
    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed `.env` file content.
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
}

impl ConfigError {
    pub fn key_not_found(path: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::KeyNotFound {
            path: path.into(),
            segment: segment.into(),
        }
    }

    pub fn wrong_type(
        path: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::WrongType {
            path: path.into(),
            expected,
            actual,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn quote_keys(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
