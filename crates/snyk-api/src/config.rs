//! API client configuration.
//!
//! Endpoint bases, API version, timeout and retry settings for the Snyk
//! client. Loaded from environment variables with defaults pointing at the
//! public Snyk API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default REST API base URL.
pub const DEFAULT_REST_API_URL: &str = "https://api.snyk.io/rest";

/// Default v1 API base URL.
pub const DEFAULT_V1_API_URL: &str = "https://api.snyk.io/v1";

/// REST API version sent with every REST request.
pub const DEFAULT_REST_API_VERSION: &str = "2024-10-15";

/// Request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retries after a rate-limited response before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Seconds to wait after a rate-limited response.
pub const DEFAULT_BACKOFF_SECS: u64 = 60;

/// Page size for paginated REST listings.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Configuration for the Snyk API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the versioned REST API.
    pub rest_base_url: String,

    /// Base URL of the legacy v1 API.
    pub v1_base_url: String,

    /// Value of the `version` query parameter on REST calls.
    pub api_version: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after HTTP 429 before a call is abandoned.
    pub max_retries: u32,

    /// Fixed backoff in seconds between rate-limited attempts.
    pub backoff_secs: u64,

    /// Page size for listings.
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_base_url: DEFAULT_REST_API_URL.to_string(),
            v1_base_url: DEFAULT_V1_API_URL.to_string(),
            api_version: DEFAULT_REST_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_secs: DEFAULT_BACKOFF_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SNYK_REST_API_URL`: REST API base (default: https://api.snyk.io/rest)
    /// - `SNYK_V1_API_URL`: v1 API base (default: https://api.snyk.io/v1)
    /// - `SNYK_API_VERSION`: REST API version (default: 2024-10-15)
    /// - `SNYK_API_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `SNYK_API_MAX_RETRIES`: Retries on HTTP 429 (default: 5)
    /// - `SNYK_API_BACKOFF_SECS`: Backoff after HTTP 429 (default: 60)
    /// - `SNYK_API_PAGE_SIZE`: Listing page size (default: 100)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            rest_base_url: std::env::var("SNYK_REST_API_URL").unwrap_or(default.rest_base_url),
            v1_base_url: std::env::var("SNYK_V1_API_URL").unwrap_or(default.v1_base_url),
            api_version: std::env::var("SNYK_API_VERSION").unwrap_or(default.api_version),
            timeout_secs: env_parse("SNYK_API_TIMEOUT_SECS").unwrap_or(default.timeout_secs),
            max_retries: env_parse("SNYK_API_MAX_RETRIES").unwrap_or(default.max_retries),
            backoff_secs: env_parse("SNYK_API_BACKOFF_SECS").unwrap_or(default.backoff_secs),
            page_size: env_parse("SNYK_API_PAGE_SIZE").unwrap_or(default.page_size),
        }
    }

    /// Request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.backoff_secs))
    }

    /// Build a REST URL by appending a path to the REST base.
    pub fn rest_url(&self, path: &str) -> String {
        join(&self.rest_base_url, path)
    }

    /// Build a v1 URL by appending a path to the v1 base.
    pub fn v1_url(&self, path: &str) -> String {
        join(&self.v1_base_url, path)
    }
}

fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
