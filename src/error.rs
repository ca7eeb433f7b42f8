//! Error types for Lekse.

use serde::Serialize;
use thiserror::Error;

/// A row that blocks a non-cascading delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentResource {
    /// Resource kind ("chunk", "transcription", "question").
    #[serde(rename = "type")]
    pub kind: String,
    /// Row id.
    pub id: i64,
}

impl DependentResource {
    pub fn new(kind: &str, id: i64) -> Self {
        Self {
            kind: kind.to_string(),
            id,
        }
    }
}

/// Library-level error type for Lekse operations.
#[derive(Error, Debug)]
pub enum LekseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("{message}")]
    DependencyViolation {
        message: String,
        resources: Vec<DependentResource>,
    },

    #[error("Audio download failed: {0}")]
    Download(String),

    #[error("Audio chunking failed: {0}")]
    Chunking(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("LLM backend unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl LekseError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Transient: connect failures, timeouts, 5xx, 408, 429. Everything
    /// else (other 4xx, decode errors, local failures) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            LekseError::Timeout(_) => true,
            LekseError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                match e.status() {
                    Some(status) => {
                        status.is_server_error()
                            || status == reqwest::StatusCode::REQUEST_TIMEOUT
                            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    }
                    None => e.is_request(),
                }
            }
            _ => false,
        }
    }
}

/// Result type alias for Lekse operations.
pub type Result<T> = std::result::Result<T, LekseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors_are_permanent() {
        assert!(!LekseError::Validation("bad".into()).is_transient());
        assert!(!LekseError::Transcription("decode failure".into()).is_transient());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!LekseError::Json(json_err).is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(LekseError::Timeout("ffmpeg exceeded 300s".into()).is_transient());
    }
}
