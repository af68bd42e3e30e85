//! Error types for the memory layer.

use std::path::PathBuf;

use notewise_ai::AiError;
use thiserror::Error;

/// Prefix put in front of system failures before they reach a user.
pub const SYSTEM_ERROR_PREFIX: &str = "Processing failed: ";

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Unsupported task type: {0}")]
    UnsupportedTask(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Summarization failed: {0}")]
    Summarization(#[source] AiError),

    #[error("Summarizer returned an empty summary")]
    EmptySummary,

    #[error("Generation failed: {0}")]
    Generation(#[source] AiError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MemoryError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether the message can be shown to the caller as-is.
    ///
    /// Parameter and validation problems are the caller's to fix; everything
    /// else is reported as a processing failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTask(_) | Self::MissingParameter(_) | Self::InvalidSessionId(_)
        )
    }

    /// Text for the single error event a failed request produces.
    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            format!("{SYSTEM_ERROR_PREFIX}{self}")
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_errors_are_user_facing() {
        let err = MemoryError::MissingParameter("filename".to_string());
        assert!(err.is_user_facing());
        assert_eq!(err.user_message(), "Missing required parameter: filename");
    }

    #[test]
    fn system_errors_get_prefixed() {
        let err = MemoryError::storage(
            "/tmp/x.jsonl",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_user_facing());
        assert!(err.user_message().starts_with(SYSTEM_ERROR_PREFIX));
        assert!(err.user_message().contains("/tmp/x.jsonl"));
    }
}
