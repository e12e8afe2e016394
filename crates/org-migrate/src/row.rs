//! CSV mapping rows.
//!
//! The mapping file is positional: a header row followed by rows of
//! `Tech Org, Asset ID, Asset Name, Repo URL, Target Display Name, Repo Count`.
//! Extra trailing columns are carried along untouched.

use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;

use crate::error::{MigrateError, Result};

pub const COL_TECH_ORG: usize = 0;
pub const COL_ASSET_ID: usize = 1;
pub const COL_ASSET_NAME: usize = 2;
pub const COL_REPO_URL: usize = 3;
pub const COL_TARGET_NAME: usize = 4;
pub const COL_REPO_COUNT: usize = 5;

/// Columns every row must have.
pub const COLUMN_COUNT: usize = 6;

/// One row of the mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub tech_org: String,
    pub asset_id: String,
    pub asset_name: String,
    pub repo_url: String,
    pub target_name: String,
    pub repo_count: String,

    /// The row exactly as read, for writing back out.
    record: StringRecord,
}

impl CsvRow {
    /// Build a row from a parsed record. `line` is only used for errors.
    pub fn from_record(record: StringRecord, line: u64) -> Result<Self> {
        if record.len() < COLUMN_COUNT {
            return Err(MigrateError::MalformedRow {
                line,
                expected: COLUMN_COUNT,
                found: record.len(),
            });
        }

        let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();

        Ok(Self {
            tech_org: field(COL_TECH_ORG),
            asset_id: field(COL_ASSET_ID),
            asset_name: field(COL_ASSET_NAME),
            repo_url: field(COL_REPO_URL),
            target_name: field(COL_TARGET_NAME),
            repo_count: field(COL_REPO_COUNT),
            record,
        })
    }

    /// The original record, verbatim.
    pub fn record(&self) -> &StringRecord {
        &self.record
    }
}

impl From<[&str; COLUMN_COUNT]> for CsvRow {
    fn from(fields: [&str; COLUMN_COUNT]) -> Self {
        let record = StringRecord::from(fields.to_vec());
        Self {
            tech_org: fields[COL_TECH_ORG].to_string(),
            asset_id: fields[COL_ASSET_ID].to_string(),
            asset_name: fields[COL_ASSET_NAME].to_string(),
            repo_url: fields[COL_REPO_URL].to_string(),
            target_name: fields[COL_TARGET_NAME].to_string(),
            repo_count: fields[COL_REPO_COUNT].to_string(),
            record,
        }
    }
}

/// Open a mapping file. The header row is consumed by the reader.
pub fn open_reader(path: &Path) -> Result<Reader<File>> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    Ok(reader)
}

/// Whether a read error is confined to a single record. The reader has
/// already moved past that record, so the caller can skip it and go on.
pub(crate) fn is_record_error(err: &csv::Error) -> bool {
    matches!(
        err.kind(),
        csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. }
    )
}

/// Line number of a record for error messages, falling back to `fallback`.
pub(crate) fn line_of(record: &StringRecord, fallback: u64) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(fallback)
}
