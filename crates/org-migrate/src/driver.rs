//! Project migration driver.
//!
//! Walks the mapping file one row at a time. For each row the source target
//! is resolved to its projects, the destination org is resolved from the
//! row's derived name, every project is moved, and the target is deleted once
//! the source no longer holds any of its projects.
//!
//! ## Row lifecycle
//!
//! ```text
//! resolve target ──none──→ done (TargetNotFound)
//!   └→ list projects ──failed──→ record (ProjectLookupFailed)
//!        ├─empty──→ done (NoProjects)
//!        └→ resolve org ──none──→ record (OrgNotFound)
//!             └→ move each project
//!                  └→ re-list projects
//!                       ├─ no failures, none left ──→ delete target (Migrated)
//!                       └─ otherwise ──→ record (Incomplete)
//! ```
//!
//! "record" appends the row to the error CSV when one is configured, so a
//! later run can retry exactly the rows that did not finish. Rows are never
//! rolled back: projects that moved stay moved.

use chrono::{DateTime, Utc};
use csv::{StringRecord, WriterBuilder};
use snyk_api::{GroupId, MoveOutcome, OrgId, SnykClient, TargetId};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::org_name::derive_org_name;
use crate::row::{is_record_error, line_of, open_reader, CsvRow};

/// Settings for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Group holding the destination orgs.
    pub group_id: GroupId,

    /// Org the targets currently live in.
    pub source_org_id: OrgId,

    /// Resolve everything but send no moves or deletes.
    pub dry_run: bool,

    /// Data rows to skip after the header, for resuming a run.
    pub skip_lines: usize,

    /// Where to append rows that did not fully migrate.
    pub error_csv: Option<PathBuf>,
}

impl MigrationOptions {
    /// Options for a live run with no resume offset and no error CSV.
    pub fn new(group_id: impl Into<GroupId>, source_org_id: impl Into<OrgId>) -> Self {
        Self {
            group_id: group_id.into(),
            source_org_id: source_org_id.into(),
            dry_run: false,
            skip_lines: 0,
            error_csv: None,
        }
    }
}

/// How a single row ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// No target with the row's display name exists in the source org.
    TargetNotFound,

    /// The target's projects could not be listed.
    ProjectLookupFailed { target_id: TargetId },

    /// The target owns no projects.
    NoProjects { target_id: TargetId },

    /// The destination org does not exist.
    OrgNotFound { org_name: String },

    /// Dry run: the moves that would have been made.
    DryRun { target_id: TargetId, org_id: OrgId, projects: usize },

    /// Every project moved and the source target was removed.
    Migrated {
        target_id: TargetId,
        moved: usize,
        target_deleted: bool,
    },

    /// Some projects failed to move or remain on the target.
    Incomplete {
        target_id: TargetId,
        moved: usize,
        failed: usize,
        /// Projects still on the target; `None` if the re-check failed.
        remaining: Option<usize>,
    },
}

impl RowOutcome {
    /// Whether the row belongs in the error CSV.
    pub fn needs_retry(&self) -> bool {
        matches!(
            self,
            RowOutcome::ProjectLookupFailed { .. }
                | RowOutcome::OrgNotFound { .. }
                | RowOutcome::Incomplete { .. }
        )
    }

    fn moved(&self) -> usize {
        match self {
            RowOutcome::Migrated { moved, .. } | RowOutcome::Incomplete { moved, .. } => *moved,
            _ => 0,
        }
    }

    fn failed(&self) -> usize {
        match self {
            RowOutcome::Incomplete { failed, .. } => *failed,
            _ => 0,
        }
    }
}

/// Totals for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,

    /// Rows passed over because of `skip_lines`.
    pub rows_skipped: usize,

    /// Rows that went through the migration steps.
    pub rows_processed: usize,

    /// Rows that could not be decoded or had too few columns.
    pub rows_malformed: usize,

    /// Rows recorded for retry.
    pub rows_failed: usize,

    /// Projects the server confirmed as moved.
    pub projects_migrated: usize,

    /// Project moves that were attempted and failed.
    pub projects_failed: usize,

    /// Projects a dry run would have moved.
    pub projects_dry_run: usize,

    /// Source targets deleted after their projects moved.
    pub targets_deleted: usize,
}

impl MigrationReport {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            rows_skipped: 0,
            rows_processed: 0,
            rows_malformed: 0,
            rows_failed: 0,
            projects_migrated: 0,
            projects_failed: 0,
            projects_dry_run: 0,
            targets_deleted: 0,
        }
    }

    fn record(&mut self, outcome: &RowOutcome) {
        self.rows_processed += 1;
        self.projects_migrated += outcome.moved();
        self.projects_failed += outcome.failed();

        match outcome {
            RowOutcome::DryRun { projects, .. } => self.projects_dry_run += projects,
            RowOutcome::Migrated {
                target_deleted: true,
                ..
            } => self.targets_deleted += 1,
            _ => {}
        }

        if outcome.needs_retry() {
            self.rows_failed += 1;
        }
    }

    /// Human-readable end-of-run summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Total projects migrated: {}\nTotal time: {:.2}s",
            self.projects_migrated,
            self.elapsed.as_secs_f64()
        );
        if self.projects_dry_run > 0 {
            out.push_str(&format!("\nProjects that would be moved (dry run): {}", self.projects_dry_run));
        }
        out
    }
}

/// Drives a migration run against the Snyk API.
pub struct Migrator<'a> {
    client: &'a SnykClient,
    options: MigrationOptions,
}

impl<'a> Migrator<'a> {
    pub fn new(client: &'a SnykClient, options: MigrationOptions) -> Self {
        Self { client, options }
    }

    /// Migrate every row of the mapping file at `csv_path`.
    ///
    /// Only an unopenable input or an unwritable error CSV stop the run.
    /// Undecodable rows and API failures are confined to their row.
    pub async fn run(&self, csv_path: &Path) -> Result<MigrationReport> {
        let clock = Instant::now();
        let mut report = MigrationReport::start();

        let mut reader = open_reader(csv_path)?;
        let headers = reader.headers()?.clone();
        let mut records = reader.records();

        for skipped in records.by_ref().take(self.options.skip_lines) {
            if let Err(e) = skipped {
                if !is_record_error(&e) {
                    return Err(e.into());
                }
            }
            report.rows_skipped += 1;
        }
        if report.rows_skipped > 0 {
            info!("Skipped {} rows", report.rows_skipped);
        }

        for (idx, record) in records.enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) if is_record_error(&e) => {
                    error!("Skipping unreadable row: {}", e);
                    report.rows_malformed += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let line = line_of(&record, (report.rows_skipped + idx) as u64 + 2);

            let row = match CsvRow::from_record(record, line) {
                Ok(row) => row,
                Err(e) => {
                    error!("Skipping row: {}", e);
                    report.rows_malformed += 1;
                    continue;
                }
            };
            debug!(?row, "Processing row");

            let outcome = self.migrate_row(&row).await;
            if outcome.needs_retry() && !self.options.dry_run {
                if let Some(path) = &self.options.error_csv {
                    append_row(path, &headers, row.record())?;
                }
            }
            report.record(&outcome);

            println!();
        }

        report.elapsed = clock.elapsed();
        info!(
            rows = report.rows_processed,
            migrated = report.projects_migrated,
            failed = report.projects_failed,
            deleted = report.targets_deleted,
            "Migration finished"
        );

        Ok(report)
    }

    /// Migrate the projects of a single row.
    pub async fn migrate_row(&self, row: &CsvRow) -> RowOutcome {
        let client = self.client;
        let source = &self.options.source_org_id;

        let Some(target_id) = client.find_target_id_by_name(source, &row.target_name).await else {
            return RowOutcome::TargetNotFound;
        };
        debug!(%target_id, "Target ID");

        let projects = match client.list_project_ids_for_target(source, &target_id).await {
            Some(projects) => projects,
            None => return RowOutcome::ProjectLookupFailed { target_id },
        };
        if projects.is_empty() {
            info!("Target {} has no projects, nothing to move", row.target_name);
            return RowOutcome::NoProjects { target_id };
        }
        debug!(?projects, "Project IDs");

        let org_name = derive_org_name(&row.asset_id, &row.asset_name);
        let Some(org_id) = client.find_org_id_by_name(&self.options.group_id, &org_name).await else {
            error!("Destination org {} does not exist, skipping {}", org_name, row.target_name);
            return RowOutcome::OrgNotFound { org_name };
        };
        debug!(%org_id, "Destination org ID");

        let mut moved = 0;
        let mut failed = 0;
        let mut dry_run = 0;

        for project_id in &projects {
            match client
                .move_project(source, &org_id, project_id, self.options.dry_run)
                .await
            {
                MoveOutcome::Moved => moved += 1,
                MoveOutcome::Failed => failed += 1,
                MoveOutcome::DryRun => dry_run += 1,
            }
        }

        if self.options.dry_run {
            return RowOutcome::DryRun {
                target_id,
                org_id,
                projects: dry_run,
            };
        }

        let remaining = client
            .list_project_ids_for_target(source, &target_id)
            .await
            .map(|left| left.len());

        if failed == 0 && remaining == Some(0) {
            let target_deleted = client.delete_target(source, &target_id).await;
            if !target_deleted {
                warn!("Projects moved but target {} could not be deleted", target_id);
            }
            return RowOutcome::Migrated {
                target_id,
                moved,
                target_deleted,
            };
        }

        error!(
            "Target {} incomplete: {} moved, {} failed, {} remaining",
            row.target_name,
            moved,
            failed,
            remaining.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );
        RowOutcome::Incomplete {
            target_id,
            moved,
            failed,
            remaining,
        }
    }
}

/// Append one row to the error CSV, writing `headers` first if the file is
/// new or empty.
fn append_row(path: &Path, headers: &StringRecord, record: &StringRecord) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;

    let mut writer = WriterBuilder::new().has_headers(false).flexible(true).from_writer(file);
    if is_empty {
        writer.write_record(headers)?;
    }
    writer.write_record(record)?;
    writer.flush()?;

    Ok(())
}
