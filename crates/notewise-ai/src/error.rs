//! Error types for the generation capability

use thiserror::Error;

/// Generation error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} request failed with status {status}: {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::LlmHttp { status, .. } => matches!(status, 408 | 429 | 500..=599),
            AiError::Llm(message) => {
                let lower = message.to_lowercase();
                lower.contains("rate limit")
                    || lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("overloaded")
            }
            AiError::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AiError::LlmHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for generation operations
pub type Result<T> = std::result::Result<T, AiError>;
