//! org-migrate - move Snyk projects into per-asset orgs from a CSV mapping.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use org_migrate::{
    extract_remaining_targets, generate_org_plan, MigrationOptions, Migrator, ORGS_JSON_OUTPUT_FILE,
    REMAINING_OUTPUT_FILE,
};
use snyk_api::{ApiConfig, OrgId, SnykClient};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "org-migrate")]
#[command(about = "Migrate Snyk projects between organizations from a CSV mapping")]
struct Cli {
    /// Echo rows, IDs and intermediate values
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the JSON structure of orgs to create
    #[command(name = "org-json")]
    OrgJson {
        /// Group ID in Snyk
        #[arg(env = "GROUP_ID")]
        group_id: String,

        /// Org in Snyk to copy integrations from
        #[arg(env = "SOURCE_ORG")]
        source_org: String,

        /// Path to the mapping CSV
        #[arg(long, env = "CSV_PATH")]
        csv_path: PathBuf,
    },

    /// Move each target's projects into its destination org
    #[command(name = "migrate-projects")]
    MigrateProjects {
        /// Group ID in Snyk
        #[arg(env = "GROUP_ID")]
        group_id: String,

        /// Org in Snyk the targets currently live in
        #[arg(env = "SOURCE_ORG")]
        source_org: String,

        /// Snyk API token
        #[arg(env = "SNYK_TOKEN", hide_env_values = true)]
        snyk_token: String,

        /// Path to the mapping CSV
        #[arg(long, env = "CSV_PATH")]
        csv_path: PathBuf,

        /// Append rows that did not fully migrate to this CSV
        #[arg(long, env = "ERROR_CSV_PATH")]
        error_csv: Option<PathBuf>,

        /// Resolve targets and orgs without moving or deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Data rows to skip after the header, to resume an earlier run
        #[arg(long, default_value = "0")]
        skip_lines: usize,
    },

    /// Extract mapping rows whose targets still hold projects
    #[command(name = "remaining-targets")]
    RemainingTargets {
        /// Org in Snyk the targets were migrated from
        #[arg(env = "SOURCE_ORG")]
        source_org: String,

        /// Snyk API token
        #[arg(env = "SNYK_TOKEN", hide_env_values = true)]
        snyk_token: String,

        /// Path to the mapping CSV
        #[arg(long, env = "CSV_PATH")]
        csv_path: PathBuf,

        /// Where to write the remaining rows
        #[arg(long, default_value = REMAINING_OUTPUT_FILE)]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Command::OrgJson {
            group_id,
            source_org,
            csv_path,
        } => {
            generate_org_plan(&csv_path, &group_id, &source_org, Path::new(ORGS_JSON_OUTPUT_FILE))
                .with_context(|| format!("failed to build org plan from {}", csv_path.display()))?;
        }
        Command::MigrateProjects {
            group_id,
            source_org,
            snyk_token,
            csv_path,
            error_csv,
            dry_run,
            skip_lines,
        } => {
            let client = SnykClient::new(ApiConfig::from_env(), snyk_token)?;
            let options = MigrationOptions {
                error_csv,
                dry_run,
                skip_lines,
                ..MigrationOptions::new(group_id, source_org)
            };

            if dry_run {
                info!("Dry run: no projects will be moved and no targets deleted");
            }

            let report = Migrator::new(&client, options)
                .run(&csv_path)
                .await
                .with_context(|| format!("migration from {} failed", csv_path.display()))?;

            println!("{}", report.summary());
        }
        Command::RemainingTargets {
            source_org,
            snyk_token,
            csv_path,
            output,
        } => {
            let client = SnykClient::new(ApiConfig::from_env(), snyk_token)?;
            let report =
                extract_remaining_targets(&client, &OrgId::from(source_org), &csv_path, &output)
                    .await
                    .context("failed to extract remaining targets")?;

            println!(
                "{} targets remaining, {} rows written to {}",
                report.targets_remaining,
                report.rows_written,
                output.display()
            );
        }
    }

    Ok(())
}
