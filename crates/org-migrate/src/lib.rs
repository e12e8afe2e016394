//! # Org Migrate
//!
//! CSV-driven migration of Snyk projects out of a shared source org and into
//! per-asset destination orgs.
//!
//! ## Overview
//!
//! The org-migrate crate handles:
//! - **Rows**: the positional mapping file format
//! - **Org naming**: `{asset id}_{asset name}`, capped at 60 characters
//! - **Org plans**: the JSON document listing destination orgs to create
//! - **Migration**: moving each target's projects and deleting the emptied target
//! - **Remaining targets**: extracting rows for targets that still hold projects
//!
//! ## Workflow
//!
//! ```text
//! mapping.csv ──org-json──→ new-orgs.json ──(create orgs)
//!      │
//!      └──migrate-projects──→ errors.csv (rows to retry)
//!                │
//!                └──remaining-targets──→ remaining-targets.csv
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use org_migrate::{MigrationOptions, Migrator};
//! use snyk_api::{ApiConfig, SnykClient};
//! use std::path::Path;
//!
//! async fn run() -> org_migrate::Result<()> {
//!     let client = SnykClient::new(ApiConfig::from_env(), "my-api-token")?;
//!     let mut options = MigrationOptions::new("group-id", "source-org-id");
//!     options.dry_run = true;
//!
//!     let report = Migrator::new(&client, options).run(Path::new("mapping.csv")).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod org_name;
pub mod plan;
pub mod remaining;
pub mod row;

pub use driver::{MigrationOptions, MigrationReport, Migrator, RowOutcome};
pub use error::{MigrateError, Result};
pub use org_name::{derive_org_name, MAX_ORG_NAME_LEN, UNKNOWN_ORG_NAME};
pub use plan::{generate_org_plan, OrgPlan, PlannedOrg, ORGS_JSON_OUTPUT_FILE};
pub use remaining::{extract_remaining_targets, RemainingReport, REMAINING_OUTPUT_FILE};
pub use row::CsvRow;
