//! Org plan generation.
//!
//! Turns the mapping file into the JSON document consumed by Snyk's bulk org
//! creation tooling: one entry per distinct destination org, in the order
//! the orgs first appear in the file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::org_name::{derive_org_name, full_org_name};
use crate::row::{is_record_error, line_of, open_reader, CsvRow};

/// File the plan is written to.
pub const ORGS_JSON_OUTPUT_FILE: &str = "new-orgs.json";

/// An org to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOrg {
    pub name: String,

    #[serde(rename = "groupId")]
    pub group_id: String,

    /// Org whose settings the new org copies.
    #[serde(rename = "sourceOrgId")]
    pub source_org_id: String,
}

/// The full plan document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgPlan {
    pub orgs: Vec<PlannedOrg>,
}

impl OrgPlan {
    /// Build a plan from rows, keeping the first occurrence of each name.
    ///
    /// Two different long names that truncate to the same prefix collapse
    /// into one entry; each such collision is logged.
    pub fn from_rows<'a>(
        rows: impl IntoIterator<Item = &'a CsvRow>,
        group_id: &str,
        source_org_id: &str,
    ) -> Self {
        // derived name -> untruncated name that first produced it
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut orgs = Vec::new();

        for row in rows {
            let full = full_org_name(&row.asset_id, &row.asset_name);
            let name = derive_org_name(&row.asset_id, &row.asset_name);

            if name != full {
                info!("Org name too long: {}", full);
                info!("Shortening to: {}", name);
            }

            match seen.get(&name) {
                Some(first) if *first != full => {
                    warn!(
                        "Org name collision after truncation: '{}' and '{}' both become '{}'",
                        first, full, name
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert(name.clone(), full);
                    orgs.push(PlannedOrg {
                        name,
                        group_id: group_id.to_string(),
                        source_org_id: source_org_id.to_string(),
                    });
                }
            }
        }

        Self { orgs }
    }

    /// Pretty-printed JSON with four-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;

        // serde_json only ever writes valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the plan to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Read the mapping file at `csv_path` and write the org plan to `output`.
pub fn generate_org_plan(
    csv_path: &Path,
    group_id: &str,
    source_org_id: &str,
    output: &Path,
) -> Result<OrgPlan> {
    let mut reader = open_reader(csv_path)?;
    let mut rows = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) if is_record_error(&e) => {
                warn!("Skipping unreadable row: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let line = line_of(&record, idx as u64 + 2);

        match CsvRow::from_record(record, line) {
            Ok(row) => {
                debug!(?row, "Read row");
                rows.push(row);
            }
            Err(e) => warn!("Skipping row: {}", e),
        }
    }

    let plan = OrgPlan::from_rows(&rows, group_id, source_org_id);
    debug!(plan = %plan.to_json()?, "Generated org plan");

    plan.write_to(output)?;
    info!(
        "Wrote {} orgs from {} rows to {}",
        plan.orgs.len(),
        rows.len(),
        output.display()
    );

    Ok(plan)
}
