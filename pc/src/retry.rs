//! Bounded retry with exponential backoff
//!
//! Applied around every backend request. The default policy makes a single
//! attempt, so calls stay single-shot unless configured otherwise.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::ApiError;

/// Retry policy for backend requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Policy that never retries
    pub fn single_shot() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the given (1-based) retry
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        %name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(%name, attempt, error = %e, "RetryPolicy::run: giving up");
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_shot()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.initial_backoff_ms))
    }
}
