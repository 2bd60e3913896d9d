//! Error types for Tolk.

use crate::synthesis::ApiStatus;
use thiserror::Error;

/// Library-level error type for Tolk operations.
#[derive(Error, Debug)]
pub enum TolkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    #[error("No audio stream available for '{0}'")]
    NoAudioStream(String),

    #[error("Speech model failed to load: {0}")]
    ModelLoad(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Synthesis rejected ({status}): {message}")]
    Synthesis { status: ApiStatus, message: String },

    #[error("Synthesis retries exhausted after {attempts} attempts: {source}")]
    SynthesisExhausted {
        attempts: u32,
        #[source]
        source: Box<TolkError>,
    },

    #[error("Cached artifact missing from disk: {0}")]
    CacheInconsistency(String),

    #[error("A pipeline run is already active")]
    RunActive,

    #[error("Run stopped before stage '{0}' started")]
    Stopped(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TolkError {
    /// Whether the retry policy may attempt this operation again.
    ///
    /// Only a synthesis rejection that signals transient capacity
    /// exhaustion (rate-limited or overloaded) is retryable. Everything
    /// else, including unclassified errors, is fatal on first occurrence.
    pub fn is_retryable(&self) -> bool {
        match self {
            TolkError::Synthesis { status, .. } => status.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias for Tolk operations.
pub type Result<T> = std::result::Result<T, TolkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let overloaded = TolkError::Synthesis {
            status: ApiStatus::Overloaded,
            message: "overloaded".into(),
        };
        assert!(overloaded.is_retryable());

        let auth = TolkError::Synthesis {
            status: ApiStatus::Authentication,
            message: "bad key".into(),
        };
        assert!(!auth.is_retryable());

        assert!(!TolkError::Transcription("engine died".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_wraps_source() {
        let err = TolkError::SynthesisExhausted {
            attempts: 3,
            source: Box::new(TolkError::Synthesis {
                status: ApiStatus::Overloaded,
                message: "still overloaded".into(),
            }),
        };
        // Exhaustion itself is terminal, never retried again.
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("3 attempts"));
    }
}
