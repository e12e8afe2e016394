//! Error types for Snyk API calls.
//!
//! Every request the client issues funnels its failure into [`ApiError`]. The
//! public client operations fold these into absence values after logging,
//! so callers mostly see this type through the retry policy and tests.

use thiserror::Error;

/// Snyk API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failed or a read timed out.
    #[error("Connection failed or timed out: {0}")]
    Timeout(String),

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// A retryable status persisted past the retry cap.
    #[error("Gave up after {attempts} attempts (last status {status})")]
    RetriesExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// Status returned by the final attempt.
        status: u16,
    },

    /// Response body was not the JSON shape expected.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// A URL could not be built from the configured base.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::RequestFailed(err)
        }
    }
}

impl ApiError {
    /// HTTP status carried by this error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::RetriesExhausted { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the call failed on a connect or read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}
