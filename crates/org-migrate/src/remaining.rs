//! Remaining-target extraction.
//!
//! After a migration pass, any target in the source org that still owns
//! projects was not fully migrated. This writes the mapping rows for those
//! targets to a fresh CSV so they can be fed back into another run.

use csv::WriterBuilder;
use snyk_api::{OrgId, SnykClient};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::row::{is_record_error, open_reader, COLUMN_COUNT, COL_TARGET_NAME};

/// Header of the remaining-targets CSV.
pub const REMAINING_HEADER: [&str; COLUMN_COUNT] = [
    "Tech Org",
    "Asset ID",
    "Asset Name",
    "Repo URL",
    "Project Name",
    "Repo Count",
];

/// Default output file for remaining targets.
pub const REMAINING_OUTPUT_FILE: &str = "remaining-targets.csv";

/// Counts from an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingReport {
    /// Non-empty targets still in the source org.
    pub targets_remaining: usize,

    /// Mapping rows written to the output.
    pub rows_written: usize,
}

/// Write every row of `csv_path` whose target still owns projects in
/// `source_org_id` to `output`, replacing any existing file.
pub async fn extract_remaining_targets(
    client: &SnykClient,
    source_org_id: &OrgId,
    csv_path: &Path,
    output: &Path,
) -> Result<RemainingReport> {
    let targets = client
        .list_non_empty_targets(source_org_id)
        .await
        .ok_or_else(|| {
            MigrateError::RemoteLookup(format!("could not list targets in org {}", source_org_id))
        })?;

    let remaining: HashSet<String> = targets
        .into_iter()
        .map(|t| t.display_name)
        .filter(|name| !name.is_empty())
        .collect();
    info!("{} targets still hold projects", remaining.len());

    let mut reader = open_reader(csv_path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(output)?;
    writer.write_record(REMAINING_HEADER)?;

    let mut rows_written = 0;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if is_record_error(&e) => {
                warn!("Skipping unreadable row: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let Some(target_name) = record.get(COL_TARGET_NAME) else {
            continue;
        };

        if remaining.contains(target_name) {
            debug!(target = target_name, "Target still has projects");
            writer.write_record(&record)?;
            rows_written += 1;
        }
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", rows_written, output.display());

    Ok(RemainingReport {
        targets_remaining: remaining.len(),
        rows_written,
    })
}
