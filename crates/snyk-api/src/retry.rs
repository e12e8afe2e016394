//! Retry policy for rate-limited API calls.
//!
//! The Snyk API answers HTTP 429 when a token exceeds its request budget.
//! Calls are retried after a fixed backoff, up to a bounded number of
//! retries. Anything else is returned to the caller on the first attempt.
//!
//! # Example
//!
//! ```rust,no_run
//! use snyk_api::{ApiError, RetryPolicy};
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, ApiError> {
//!     let policy = RetryPolicy::new(3, Duration::from_secs(60));
//!
//!     policy.execute(|| async {
//!         // Your request here
//!         Ok("done".to_string())
//!     }).await
//! }
//! ```

use std::time::Duration;
use tokio::time::sleep;

use crate::error::ApiError;

/// HTTP status the Snyk API uses for rate limiting.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Fixed-backoff retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,

    /// Pause before each retry.
    pub backoff: Duration,

    /// Statuses that trigger a retry.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_MAX_RETRIES,
            Duration::from_secs(crate::config::DEFAULT_BACKOFF_SECS),
        )
    }
}

impl RetryPolicy {
    /// Create a policy that retries rate-limited responses.
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
            retry_statuses: vec![TOO_MANY_REQUESTS],
        }
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            retry_statuses: Vec::new(),
        }
    }

    /// Whether `err` should be retried under this policy.
    pub fn is_retryable(&self, err: &ApiError) -> bool {
        match err {
            ApiError::Status { status, .. } => self.retry_statuses.contains(status),
            _ => false,
        }
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// retry cap is reached.
    ///
    /// Exhausting the cap yields [`ApiError::RetriesExhausted`] carrying the
    /// last status seen.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Request succeeded after backoff");
                    }
                    return Ok(result);
                }
                Err(e) if !self.is_retryable(&e) => return Err(e),
                Err(e) if attempt > self.max_retries => {
                    let status = e.status().unwrap_or(TOO_MANY_REQUESTS);
                    tracing::error!(attempts = attempt, status, "Retry limit reached, giving up");
                    return Err(ApiError::RetriesExhausted {
                        attempts: attempt,
                        status,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_secs = self.backoff.as_secs(),
                        error = %e,
                        "Rate limited, backing off"
                    );

                    sleep(self.backoff).await;
                }
            }
        }
    }
}
