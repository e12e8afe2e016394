//! # Snyk API
//!
//! Typed client for the parts of the Snyk API used when moving projects
//! between organizations.
//!
//! ## Overview
//!
//! The snyk-api crate handles:
//! - **Targets**: lookup by display name, listing non-empty targets, deletion
//! - **Projects**: paginated listing by target, moves between orgs (v1 API)
//! - **Organizations**: lookup by name within a group
//! - **Rate limiting**: fixed backoff on HTTP 429 with a bounded retry count
//!
//! ## Usage
//!
//! ```rust,no_run
//! use snyk_api::{ApiConfig, OrgId, SnykClient};
//!
//! async fn example() -> Result<(), snyk_api::ApiError> {
//!     let client = SnykClient::new(ApiConfig::from_env(), "my-api-token")?;
//!
//!     let org = OrgId::from("source-org-id");
//!     if let Some(target_id) = client.find_target_id_by_name(&org, "acme/api").await {
//!         let projects = client.list_project_ids_for_target(&org, &target_id).await;
//!         println!("{:?}", projects);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use client::SnykClient;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use retry::RetryPolicy;
pub use types::{GroupId, MoveOutcome, OrgId, ProjectId, Target, TargetId};
