//! Bounded retry with fixed backoff for flaky remote calls.
//!
//! The policy distinguishes transient capacity exhaustion (retried with a
//! fixed delay, matching the remote API's observed behavior) from fatal
//! rejections (propagated immediately). The backoff is deliberately not
//! exponential.

use crate::error::{Result, TolkError};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Default number of total attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Retry policy for a fallible remote operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Invoke `operation` until it succeeds, fails fatally, or attempts
    /// run out.
    ///
    /// Retryable failures sleep for the fixed base delay between attempts.
    /// On exhaustion the last underlying error is wrapped in
    /// [`TolkError::SynthesisExhausted`], so callers can tell "never
    /// worked" apart from "stopped retrying".
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 1..=self.max_attempts {
            info!("Attempt {}/{}", attempt, self.max_attempts);

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    if attempt < self.max_attempts {
                        warn!(
                            "Transient failure ({}), retrying in {:?}",
                            e, self.base_delay
                        );
                        tokio::time::sleep(self.base_delay).await;
                    } else {
                        warn!("Max retries reached: {}", e);
                        return Err(TolkError::SynthesisExhausted {
                            attempts: self.max_attempts,
                            source: Box::new(e),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop always returns within max_attempts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::ApiStatus;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn overloaded() -> TolkError {
        TolkError::Synthesis {
            status: ApiStatus::Overloaded,
            message: "temporarily overloaded".into(),
        }
    }

    fn bad_request() -> TolkError {
        TolkError::Synthesis {
            status: ApiStatus::BadRequest,
            message: "malformed".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let result = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(overloaded())
                    } else {
                        Ok("document")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "document");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Exactly two fixed-delay sleeps, no exponential growth.
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(overloaded()) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Two sleeps: none after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        match result.unwrap_err() {
            TolkError::SynthesisExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    *source,
                    TolkError::Synthesis {
                        status: ApiStatus::Overloaded,
                        ..
                    }
                ));
            }
            other => panic!("expected SynthesisExhausted, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_propagates_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(bad_request()) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(matches!(
            result.unwrap_err(),
            TolkError::Synthesis {
                status: ApiStatus::BadRequest,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_first_attempt_success_skips_policy() {
        let policy = RetryPolicy::default();
        let result = policy.execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
