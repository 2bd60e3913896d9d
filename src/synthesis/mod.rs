//! Synthesis module: turn a full transcript into a markdown analysis
//! document via a remote generation call.

mod claude;

pub use claude::ClaudeGenerator;

use crate::config::build_analysis_prompt;
use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Classified status of a rejected generation call.
///
/// Mirrors the remote API's status indicators; the retry policy treats
/// rate-limited and overloaded as transient, everything else as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiStatus {
    BadRequest,
    Authentication,
    Forbidden,
    NotFound,
    TooLarge,
    RateLimited,
    ServerError,
    Overloaded,
    Unknown,
}

impl ApiStatus {
    /// Classify an HTTP status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            400 => ApiStatus::BadRequest,
            401 => ApiStatus::Authentication,
            403 => ApiStatus::Forbidden,
            404 => ApiStatus::NotFound,
            413 => ApiStatus::TooLarge,
            429 => ApiStatus::RateLimited,
            500 => ApiStatus::ServerError,
            529 => ApiStatus::Overloaded,
            _ => ApiStatus::Unknown,
        }
    }

    /// Whether this status signals transient capacity exhaustion.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiStatus::RateLimited | ApiStatus::Overloaded)
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApiStatus::BadRequest => "bad-request",
            ApiStatus::Authentication => "authentication",
            ApiStatus::Forbidden => "forbidden",
            ApiStatus::NotFound => "not-found",
            ApiStatus::TooLarge => "too-large",
            ApiStatus::RateLimited => "rate-limited",
            ApiStatus::ServerError => "server-error",
            ApiStatus::Overloaded => "overloaded",
            ApiStatus::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Trait for document generation services.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Send a prompt and return the generated document text.
    ///
    /// Rejections surface as [`crate::error::TolkError::Synthesis`] with a
    /// classified status.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Run the synthesis stage: build the analysis prompt and invoke the
/// generator through the retry policy.
#[instrument(skip_all)]
pub async fn synthesize(
    generator: &dyn DocumentGenerator,
    retry: &RetryPolicy,
    transcript_text: &str,
) -> Result<String> {
    let prompt = build_analysis_prompt(transcript_text);
    info!("Sending transcript for analysis ({} chars)", transcript_text.len());
    retry.execute(|| generator.generate(&prompt)).await
}

/// Persist the markdown document atomically.
///
/// Written to a temp file in the destination directory first and renamed
/// into place, so a crash mid-write never leaves a partial document.
pub fn write_markdown(path: &Path, document: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, document.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TolkError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyGenerator {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DocumentGenerator for FlakyGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TolkError::Synthesis {
                    status: ApiStatus::Overloaded,
                    message: "overloaded".into(),
                })
            } else {
                Ok("# Analysis\n\n## Summary\n".to_string())
            }
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiStatus::from_code(400), ApiStatus::BadRequest);
        assert_eq!(ApiStatus::from_code(401), ApiStatus::Authentication);
        assert_eq!(ApiStatus::from_code(413), ApiStatus::TooLarge);
        assert_eq!(ApiStatus::from_code(529), ApiStatus::Overloaded);
        assert_eq!(ApiStatus::from_code(502), ApiStatus::Unknown);

        assert!(ApiStatus::RateLimited.is_retryable());
        assert!(ApiStatus::Overloaded.is_retryable());
        assert!(!ApiStatus::ServerError.is_retryable());
        assert!(!ApiStatus::Unknown.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesize_retries_transient_overload() {
        let generator = FlakyGenerator {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let retry = RetryPolicy::default();

        let document = synthesize(&generator, &retry, "[0.00s -> 1.00s] hi")
            .await
            .unwrap();

        assert!(document.contains("Summary"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_write_markdown_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Example_Title_analysis.md");

        write_markdown(&path, "# Analysis\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Analysis\n");

        // Overwrite replaces wholesale.
        write_markdown(&path, "# Revised\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Revised\n");
    }
}
