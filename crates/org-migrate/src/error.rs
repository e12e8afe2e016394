//! Error types for migration runs.

use snyk_api::ApiError;
use thiserror::Error;

/// Migration error types.
///
/// These cover the failures that stop a whole command: unreadable input,
/// unwritable output, or a remote listing the command cannot proceed
/// without. Per-row API failures never surface here.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON could not be written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV row has fewer columns than the mapping format requires
    #[error("Malformed row at line {line}: expected {expected} columns, found {found}")]
    MalformedRow {
        /// 1-based line number in the input file.
        line: u64,
        /// Columns required.
        expected: usize,
        /// Columns present.
        found: usize,
    },

    /// API client could not be constructed
    #[error("API client error: {0}")]
    Api(#[from] ApiError),

    /// A listing the command depends on could not be fetched
    #[error("Remote lookup failed: {0}")]
    RemoteLookup(String),
}

/// Result type for migration commands.
pub type Result<T> = std::result::Result<T, MigrateError>;
