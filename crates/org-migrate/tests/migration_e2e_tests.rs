//! End-to-end tests for the org-migrate commands.
//!
//! A wiremock server plays the Snyk API (REST under `/rest`, v1 under `/v1`)
//! and each test drives a command over a small mapping file written to a
//! temporary directory.

use org_migrate::{
    extract_remaining_targets, generate_org_plan, MigrationOptions, Migrator, RowOutcome,
};
use snyk_api::{ApiConfig, OrgId, RetryPolicy, SnykClient, TargetId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEADER: &str = "Tech Org,Asset ID,Asset Name,Repo URL,Target Display Name,Repo Count";

/// Mock API, a client pointed at it, and a scratch directory.
struct TestFixture {
    server: MockServer,
    client: SnykClient,
    dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_timeout(10).await
    }

    async fn with_timeout(timeout_secs: u64) -> Self {
        let server = MockServer::start().await;
        let config = ApiConfig {
            rest_base_url: format!("{}/rest", server.uri()),
            v1_base_url: format!("{}/v1", server.uri()),
            timeout_secs,
            ..ApiConfig::default()
        };
        let client = SnykClient::new(config, "test-token")
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));

        Self {
            server,
            client,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write_csv(&self, rows: &[&str]) -> PathBuf {
        let path = self.dir.path().join("mapping.csv");
        let mut contents = format!("{}\n", HEADER);
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Mapping file whose middle row has an Asset Name that is not UTF-8.
    fn write_csv_with_undecodable_row(&self, first: &str, last: &str) -> PathBuf {
        let path = self.dir.path().join("mapping.csv");
        let mut contents = format!("{}\n{}\n", HEADER, first).into_bytes();
        contents.extend_from_slice(b"TechB,B1,\xff\xfe,http://b,TargetB,1\n");
        contents.extend_from_slice(format!("{}\n", last).as_bytes());
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn error_csv(&self) -> PathBuf {
        self.dir.path().join("errors.csv")
    }

    fn options(&self) -> MigrationOptions {
        MigrationOptions {
            error_csv: Some(self.error_csv()),
            ..MigrationOptions::new("grp-1", "org-src")
        }
    }

    async fn mock_target(&self, name: &str, target_id: Option<&str>) {
        let data = match target_id {
            Some(id) => serde_json::json!([{"id": id, "type": "target", "attributes": {"display_name": name}}]),
            None => serde_json::json!([]),
        };
        Mock::given(method("GET"))
            .and(path("/rest/orgs/org-src/targets"))
            .and(query_param("display_name", name))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": data})))
            .mount(&self.server)
            .await;
    }

    /// First listing returns `before`, every later listing returns `after`.
    async fn mock_projects(&self, target_id: &str, before: &[&str], after: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/rest/orgs/org-src/projects"))
            .and(query_param("target_id", target_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(projects(before)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/orgs/org-src/projects"))
            .and(query_param("target_id", target_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(projects(after)))
            .mount(&self.server)
            .await;
    }

    async fn mock_org(&self, name: &str, org_id: Option<&str>) {
        let data = match org_id {
            Some(id) => serde_json::json!([{"id": id, "type": "org", "attributes": {"name": name}}]),
            None => serde_json::json!([]),
        };
        Mock::given(method("GET"))
            .and(path("/rest/groups/grp-1/orgs"))
            .and(query_param("name", name))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": data})))
            .mount(&self.server)
            .await;
    }

    async fn mock_move(&self, project_id: &str, dest: &str, response: ResponseTemplate, times: u64) {
        Mock::given(method("PUT"))
            .and(path(format!("/v1/org/org-src/project/{}/move", project_id)))
            .and(body_json(serde_json::json!({"targetOrgId": dest})))
            .respond_with(response)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    async fn mock_delete(&self, target_id: &str, times: u64) {
        Mock::given(method("DELETE"))
            .and(path(format!("/rest/orgs/org-src/targets/{}", target_id)))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(&self.server)
            .await;
    }
}

fn projects(ids: &[&str]) -> serde_json::Value {
    let data: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "type": "project"}))
        .collect();
    serde_json::json!({"data": data, "links": {}})
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// =============================================================================
// Migration
// =============================================================================

/// All projects move, the target empties out and is deleted.
#[tokio::test]
async fn test_full_row_migration_deletes_target() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&["TechA,A1,AssetX,http://x,TargetX,2"]);

    fixture.mock_target("TargetX", Some("T1")).await;
    fixture.mock_projects("T1", &["P1", "P2"], &[]).await;
    fixture.mock_org("A1_AssetX", Some("O1")).await;
    fixture.mock_move("P1", "O1", ResponseTemplate::new(200), 1).await;
    fixture.mock_move("P2", "O1", ResponseTemplate::new(200), 1).await;
    fixture.mock_delete("T1", 1).await;

    let report = Migrator::new(&fixture.client, fixture.options())
        .run(&csv)
        .await
        .unwrap();

    assert_eq!(report.rows_processed, 1);
    assert_eq!(report.projects_migrated, 2);
    assert_eq!(report.targets_deleted, 1);
    assert_eq!(report.rows_failed, 0);
    assert!(!fixture.error_csv().exists());
}

/// One timed-out move keeps the target and records the row.
#[tokio::test]
async fn test_failed_move_keeps_target_and_records_row() {
    let fixture = TestFixture::with_timeout(1).await;
    let row = "TechA,A1,AssetX,http://x,TargetX,3";
    let csv = fixture.write_csv(&[row]);

    fixture.mock_target("TargetX", Some("T1")).await;
    fixture.mock_projects("T1", &["P1", "P2", "P3"], &["P2"]).await;
    fixture.mock_org("A1_AssetX", Some("O1")).await;
    fixture.mock_move("P1", "O1", ResponseTemplate::new(200), 1).await;
    fixture
        .mock_move(
            "P2",
            "O1",
            ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
            1,
        )
        .await;
    fixture.mock_move("P3", "O1", ResponseTemplate::new(200), 1).await;
    fixture.mock_delete("T1", 0).await;

    let report = Migrator::new(&fixture.client, fixture.options())
        .run(&csv)
        .await
        .unwrap();

    assert_eq!(report.projects_migrated, 2);
    assert_eq!(report.projects_failed, 1);
    assert_eq!(report.targets_deleted, 0);
    assert_eq!(report.rows_failed, 1);
    assert_eq!(read(&fixture.error_csv()), format!("{}\n{}\n", HEADER, row));
}

/// Moves all succeed but projects are still on the target afterwards.
#[tokio::test]
async fn test_non_empty_target_after_moves_is_recorded() {
    let fixture = TestFixture::new().await;

    fixture.mock_target("TargetX", Some("T1")).await;
    fixture.mock_projects("T1", &["P1"], &["P-new"]).await;
    fixture.mock_org("A1_AssetX", Some("O1")).await;
    fixture.mock_move("P1", "O1", ResponseTemplate::new(200), 1).await;
    fixture.mock_delete("T1", 0).await;

    let migrator = Migrator::new(&fixture.client, fixture.options());
    let row = org_migrate::CsvRow::from(["TechA", "A1", "AssetX", "http://x", "TargetX", "1"]);
    let outcome = migrator.migrate_row(&row).await;

    assert_eq!(
        outcome,
        RowOutcome::Incomplete {
            target_id: TargetId::from("T1"),
            moved: 1,
            failed: 0,
            remaining: Some(1),
        }
    );
}

/// A missing destination org stops the row before any move.
#[tokio::test]
async fn test_missing_org_skips_moves() {
    let fixture = TestFixture::new().await;
    let row = "TechA,A9,Ghost,http://x,TargetG,1";
    let csv = fixture.write_csv(&[row]);

    fixture.mock_target("TargetG", Some("TG")).await;
    fixture.mock_projects("TG", &["P1"], &["P1"]).await;
    fixture.mock_org("A9_Ghost", None).await;
    fixture.mock_move("P1", "O1", ResponseTemplate::new(200), 0).await;
    fixture.mock_delete("TG", 0).await;

    let report = Migrator::new(&fixture.client, fixture.options())
        .run(&csv)
        .await
        .unwrap();

    assert_eq!(report.projects_migrated, 0);
    assert_eq!(report.rows_failed, 1);
    assert_eq!(read(&fixture.error_csv()), format!("{}\n{}\n", HEADER, row));
}

/// Unknown targets and empty targets end the row quietly.
#[tokio::test]
async fn test_missing_and_empty_targets_are_not_recorded() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&[
        "TechA,A1,AssetX,http://x,Nowhere,0",
        "TechA,A2,AssetY,http://y,Hollow,0",
    ]);

    fixture.mock_target("Nowhere", None).await;
    fixture.mock_target("Hollow", Some("TH")).await;
    fixture.mock_projects("TH", &[], &[]).await;

    Mock::given(method("GET"))
        .and(path("/rest/groups/grp-1/orgs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let report = Migrator::new(&fixture.client, fixture.options())
        .run(&csv)
        .await
        .unwrap();

    assert_eq!(report.rows_processed, 2);
    assert_eq!(report.rows_failed, 0);
    assert!(!fixture.error_csv().exists());
}

/// Rows before the resume offset never reach the API.
#[tokio::test]
async fn test_skip_lines_resumes_after_offset() {
    let fixture = TestFixture::new().await;
    let rows: Vec<String> = (1..=7)
        .map(|n| format!("Tech,A{n},Asset{n},http://r{n},Target{n},1"))
        .collect();
    let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let csv = fixture.write_csv(&row_refs);

    for n in 1..=5 {
        Mock::given(method("GET"))
            .and(path("/rest/orgs/org-src/targets"))
            .and(query_param("display_name", format!("Target{n}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(0)
            .mount(&fixture.server)
            .await;
    }
    for n in 6..=7 {
        Mock::given(method("GET"))
            .and(path("/rest/orgs/org-src/targets"))
            .and(query_param("display_name", format!("Target{n}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(1)
            .mount(&fixture.server)
            .await;
    }

    let options = MigrationOptions {
        skip_lines: 5,
        ..fixture.options()
    };
    let report = Migrator::new(&fixture.client, options).run(&csv).await.unwrap();

    assert_eq!(report.rows_skipped, 5);
    assert_eq!(report.rows_processed, 2);
}

/// Dry runs resolve everything but never move, delete or record.
#[tokio::test]
async fn test_dry_run_moves_nothing() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&["TechA,A1,AssetX,http://x,TargetX,2"]);

    fixture.mock_target("TargetX", Some("T1")).await;
    fixture.mock_projects("T1", &["P1", "P2"], &["P1", "P2"]).await;
    fixture.mock_org("A1_AssetX", Some("O1")).await;
    fixture.mock_move("P1", "O1", ResponseTemplate::new(200), 0).await;
    fixture.mock_move("P2", "O1", ResponseTemplate::new(200), 0).await;
    fixture.mock_delete("T1", 0).await;

    let options = MigrationOptions {
        dry_run: true,
        ..fixture.options()
    };
    let report = Migrator::new(&fixture.client, options).run(&csv).await.unwrap();

    assert_eq!(report.projects_dry_run, 2);
    assert_eq!(report.projects_migrated, 0);
    assert_eq!(report.projects_failed, 0);
    assert!(!fixture.error_csv().exists());
}

/// A malformed row is skipped without stopping the run.
#[tokio::test]
async fn test_malformed_row_does_not_stop_run() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&["TechA,A1", "TechA,A2,AssetY,http://y,Nowhere,0"]);

    fixture.mock_target("Nowhere", None).await;

    let report = Migrator::new(&fixture.client, fixture.options())
        .run(&csv)
        .await
        .unwrap();

    assert_eq!(report.rows_malformed, 1);
    assert_eq!(report.rows_processed, 1);
}

/// A row that is not valid UTF-8 is skipped and later rows still run.
#[tokio::test]
async fn test_undecodable_row_does_not_stop_run() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv_with_undecodable_row(
        "TechA,A1,AssetX,http://x,TargetA,0",
        "TechC,C1,AssetZ,http://z,TargetC,0",
    );

    for name in ["TargetA", "TargetC"] {
        Mock::given(method("GET"))
            .and(path("/rest/orgs/org-src/targets"))
            .and(query_param("display_name", name))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(1)
            .mount(&fixture.server)
            .await;
    }

    let report = Migrator::new(&fixture.client, fixture.options())
        .run(&csv)
        .await
        .unwrap();

    assert_eq!(report.rows_malformed, 1);
    assert_eq!(report.rows_processed, 2);
}

/// An undecodable row inside the resume offset still counts as skipped.
#[tokio::test]
async fn test_undecodable_row_within_skip_offset() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv_with_undecodable_row(
        "TechA,A1,AssetX,http://x,TargetA,0",
        "TechC,C1,AssetZ,http://z,TargetC,0",
    );

    Mock::given(method("GET"))
        .and(path("/rest/orgs/org-src/targets"))
        .and(query_param("display_name", "TargetC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let options = MigrationOptions {
        skip_lines: 2,
        ..fixture.options()
    };
    let report = Migrator::new(&fixture.client, options).run(&csv).await.unwrap();

    assert_eq!(report.rows_skipped, 2);
    assert_eq!(report.rows_processed, 1);
}

// =============================================================================
// Org plan
// =============================================================================

#[tokio::test]
async fn test_org_plan_written_to_output() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&[
        "TechA,A1,AssetX,http://x,TargetX,2",
        "TechA,A1,AssetX,http://x2,TargetX2,1",
        "TechB,,AssetZ,http://z,TargetZ,1",
    ]);
    let output = fixture.dir.path().join("new-orgs.json");

    let plan = generate_org_plan(&csv, "grp-1", "org-src", &output).unwrap();
    assert_eq!(plan.orgs.len(), 2);

    let written: serde_json::Value = serde_json::from_str(&read(&output)).unwrap();
    assert_eq!(
        written,
        serde_json::json!({"orgs": [
            {"name": "A1_AssetX", "groupId": "grp-1", "sourceOrgId": "org-src"},
            {"name": "Unknown Asset ID", "groupId": "grp-1", "sourceOrgId": "org-src"}
        ]})
    );
}

#[tokio::test]
async fn test_org_plan_skips_undecodable_row() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv_with_undecodable_row(
        "TechA,A1,AssetX,http://x,TargetA,1",
        "TechC,C1,AssetZ,http://z,TargetC,1",
    );
    let output = fixture.dir.path().join("new-orgs.json");

    let plan = generate_org_plan(&csv, "grp-1", "org-src", &output).unwrap();
    let names: Vec<&str> = plan.orgs.iter().map(|o| o.name.as_str()).collect();

    assert_eq!(names, vec!["A1_AssetX", "C1_AssetZ"]);
}

// =============================================================================
// Remaining targets
// =============================================================================

#[tokio::test]
async fn test_remaining_targets_extracts_matching_rows() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&[
        "TechA,A1,AssetX,http://x,TargetA,2",
        "TechB,B1,AssetY,http://y,TargetB,1",
    ]);
    let output = fixture.dir.path().join("remaining.csv");
    std::fs::write(&output, "stale contents\n").unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/orgs/org-src/targets"))
        .and(query_param("exclude_empty", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "TB", "type": "target", "attributes": {"display_name": "TargetB"}}],
            "links": {}
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let report = extract_remaining_targets(&fixture.client, &OrgId::from("org-src"), &csv, &output)
        .await
        .unwrap();

    assert_eq!(report.targets_remaining, 1);
    assert_eq!(report.rows_written, 1);
    assert_eq!(
        read(&output),
        "Tech Org,Asset ID,Asset Name,Repo URL,Project Name,Repo Count\nTechB,B1,AssetY,http://y,TargetB,1\n"
    );
}

#[tokio::test]
async fn test_remaining_targets_skips_undecodable_row() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv_with_undecodable_row(
        "TechA,A1,AssetX,http://x,TargetA,2",
        "TechC,C1,AssetZ,http://z,TargetC,1",
    );
    let output = fixture.dir.path().join("remaining.csv");

    Mock::given(method("GET"))
        .and(path("/rest/orgs/org-src/targets"))
        .and(query_param("exclude_empty", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"id": "TB", "type": "target", "attributes": {"display_name": "TargetB"}},
                {"id": "TC", "type": "target", "attributes": {"display_name": "TargetC"}}
            ]
        })))
        .mount(&fixture.server)
        .await;

    let report = extract_remaining_targets(&fixture.client, &OrgId::from("org-src"), &csv, &output)
        .await
        .unwrap();

    assert_eq!(report.rows_written, 1);
    assert!(read(&output).ends_with("TechC,C1,AssetZ,http://z,TargetC,1\n"));
}

#[tokio::test]
async fn test_remaining_targets_fails_when_listing_fails() {
    let fixture = TestFixture::new().await;
    let csv = fixture.write_csv(&["TechA,A1,AssetX,http://x,TargetA,2"]);
    let output = fixture.dir.path().join("remaining.csv");

    Mock::given(method("GET"))
        .and(path("/rest/orgs/org-src/targets"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&fixture.server)
        .await;

    let result = extract_remaining_targets(&fixture.client, &OrgId::from("org-src"), &csv, &output).await;

    assert!(matches!(result, Err(org_migrate::MigrateError::RemoteLookup(_))));
}
