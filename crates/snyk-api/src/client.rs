//! Snyk service client.
//!
//! HTTP client for the handful of Snyk endpoints project migration relies on:
//! target and organization lookup by name, paginated project listing,
//! project moves through the v1 API, and target deletion.
//!
//! Every public operation handles its own failures: errors are logged and
//! folded into absence (`None`, `false`, [`MoveOutcome::Failed`]) so one bad
//! call never aborts a migration run.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};
use urlencoding::encode;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::retry::RetryPolicy;
use crate::types::{
    GroupId, ListResponse, MoveOutcome, MoveProjectRequest, OrgAttributes, OrgId, ProjectAttributes,
    ProjectId, Resource, Target, TargetAttributes, TargetId,
};

/// Snyk API client.
#[derive(Clone)]
pub struct SnykClient {
    /// HTTP client instance.
    client: Client,

    /// Endpoint and paging configuration.
    config: ApiConfig,

    /// Backoff policy for rate-limited calls.
    retry: RetryPolicy,

    /// API token.
    token: String,
}

impl SnykClient {
    /// Create a new client authenticating with `token`.
    pub fn new(config: ApiConfig, token: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ApiError::RequestFailed)?;

        Ok(Self {
            client,
            retry: config.retry_policy(),
            config,
            token: token.into(),
        })
    }

    /// Replace the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Client configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Look up a target by exact display name.
    ///
    /// The server filter is partial, so the first result whose display name
    /// equals `name` is returned. `None` when there is no exact match or the
    /// lookup failed.
    #[instrument(skip(self), fields(org_id = %org_id))]
    pub async fn find_target_id_by_name(&self, org_id: &OrgId, name: &str) -> Option<TargetId> {
        let url = self.config.rest_url(&format!(
            "orgs/{}/targets?version={}&display_name={}",
            encode(org_id.as_str()),
            encode(&self.config.api_version),
            encode(name)
        ));

        match self.get_json::<ListResponse<TargetAttributes>>(&url).await {
            Ok(page) => {
                let found = page.data.into_iter().find(|target| {
                    target
                        .attributes
                        .as_ref()
                        .and_then(|a| a.display_name.as_deref())
                        == Some(name)
                });

                match found {
                    Some(target) => {
                        debug!(target_id = %target.id, "Resolved target");
                        Some(TargetId(target.id))
                    }
                    None => {
                        warn!("Did not find a target with name: {}", name);
                        None
                    }
                }
            }
            Err(e) => {
                error!("Could not look up target {}: {}", name, e);
                None
            }
        }
    }

    /// List every project owned by a target, following pagination.
    ///
    /// IDs are returned in the server's page order. `None` means the listing
    /// failed part way and must not be read as "no projects".
    #[instrument(skip(self), fields(org_id = %org_id, target_id = %target_id))]
    pub async fn list_project_ids_for_target(
        &self,
        org_id: &OrgId,
        target_id: &TargetId,
    ) -> Option<Vec<ProjectId>> {
        let url = self.config.rest_url(&format!(
            "orgs/{}/projects?version={}&target_id={}&limit={}",
            encode(org_id.as_str()),
            encode(&self.config.api_version),
            encode(target_id.as_str()),
            self.config.page_size
        ));

        match self.list_all::<ProjectAttributes>(&url).await {
            Ok(projects) => {
                let ids: Vec<ProjectId> = projects.into_iter().map(|p| ProjectId(p.id)).collect();
                debug!(count = ids.len(), "Listed target projects");
                Some(ids)
            }
            Err(e) => {
                error!("Could not list projects for target {}: {}", target_id, e);
                None
            }
        }
    }

    /// Look up an organization in a group by exact name.
    #[instrument(skip(self), fields(group_id = %group_id))]
    pub async fn find_org_id_by_name(&self, group_id: &GroupId, name: &str) -> Option<OrgId> {
        let url = self.config.rest_url(&format!(
            "groups/{}/orgs?version={}&name={}",
            encode(group_id.as_str()),
            encode(&self.config.api_version),
            encode(name)
        ));

        match self.get_json::<ListResponse<OrgAttributes>>(&url).await {
            Ok(page) => {
                let found = page
                    .data
                    .into_iter()
                    .find(|org| org.attributes.as_ref().is_some_and(|a| a.name == name));

                match found {
                    Some(org) => {
                        debug!(org_id = %org.id, "Resolved organization");
                        Some(OrgId(org.id))
                    }
                    None => {
                        warn!("Did not find an org with name: {}", name);
                        None
                    }
                }
            }
            Err(e) => {
                error!("Could not look up org {}: {}", name, e);
                None
            }
        }
    }

    /// Move a project to another organization through the v1 API.
    ///
    /// A dry run sends nothing. Timeouts are not retried.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn move_project(
        &self,
        source_org_id: &OrgId,
        dest_org_id: &OrgId,
        project_id: &ProjectId,
        dry_run: bool,
    ) -> MoveOutcome {
        if dry_run {
            info!(
                "[dry run] Would move project {} from {} to {}",
                project_id, source_org_id, dest_org_id
            );
            return MoveOutcome::DryRun;
        }

        let url = self.config.v1_url(&format!(
            "org/{}/project/{}/move",
            encode(source_org_id.as_str()),
            encode(project_id.as_str())
        ));
        let body = MoveProjectRequest {
            target_org_id: dest_org_id.as_str(),
        };

        let result = self
            .retry
            .execute(|| {
                let request = self.client.put(&url).json(&body);
                async move { self.send(request).await }
            })
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                info!("Moved project {} to {}", project_id, dest_org_id);
                MoveOutcome::Moved
            }
            Ok(response) => {
                error!(
                    "Could not complete move for {}, reason: {}",
                    project_id,
                    response.status().as_u16()
                );
                MoveOutcome::Failed
            }
            Err(e) if e.is_timeout() => {
                error!("Timed out moving project {}, skipping", project_id);
                MoveOutcome::Failed
            }
            Err(e) => {
                error!("Could not complete move for {}, reason: {}", project_id, e);
                MoveOutcome::Failed
            }
        }
    }

    /// Delete a target. Succeeds only on HTTP 204.
    #[instrument(skip(self), fields(org_id = %org_id, target_id = %target_id))]
    pub async fn delete_target(&self, org_id: &OrgId, target_id: &TargetId) -> bool {
        let url = self.config.rest_url(&format!(
            "orgs/{}/targets/{}?version={}",
            encode(org_id.as_str()),
            encode(target_id.as_str()),
            encode(&self.config.api_version)
        ));

        let result = self
            .retry
            .execute(|| {
                let request = self.client.delete(&url);
                async move { self.send(request).await }
            })
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => {
                info!("Deleted target {}", target_id);
                true
            }
            Ok(response) => {
                error!(
                    "Could not delete target {}, reason: {}",
                    target_id,
                    response.status().as_u16()
                );
                false
            }
            Err(e) => {
                error!("Could not delete target {}, reason: {}", target_id, e);
                false
            }
        }
    }

    /// List every target in an org that still owns at least one project.
    #[instrument(skip(self), fields(org_id = %org_id))]
    pub async fn list_non_empty_targets(&self, org_id: &OrgId) -> Option<Vec<Target>> {
        let url = self.config.rest_url(&format!(
            "orgs/{}/targets?version={}&exclude_empty=true&limit={}",
            encode(org_id.as_str()),
            encode(&self.config.api_version),
            self.config.page_size
        ));

        match self.list_all::<TargetAttributes>(&url).await {
            Ok(targets) => Some(
                targets
                    .into_iter()
                    .map(|t| Target {
                        display_name: t
                            .attributes
                            .and_then(|a| a.display_name)
                            .unwrap_or_default(),
                        id: TargetId(t.id),
                    })
                    .collect(),
            ),
            Err(e) => {
                error!("Could not list targets for org {}: {}", org_id, e);
                None
            }
        }
    }

    /// Fetch every page of a listing, starting at `first_url`.
    async fn list_all<A>(&self, first_url: &str) -> ApiResult<Vec<Resource<A>>>
    where
        A: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut url = first_url.to_string();

        loop {
            let page: ListResponse<A> = self.get_json(&url).await?;
            let next = page.next_link().map(|next| self.resolve_next(next)).transpose()?;
            items.extend(page.data);

            match next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        Ok(items)
    }

    /// Resolve a `links.next` value against the REST base.
    fn resolve_next(&self, next: &str) -> ApiResult<String> {
        if next.starts_with("http://") || next.starts_with("https://") {
            return Ok(next.to_string());
        }

        let base = Url::parse(&self.config.rest_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.config.rest_base_url, e)))?;
        let base_path = base.path().trim_end_matches('/');

        if !base_path.is_empty() && next.starts_with(&format!("{}/", base_path)) {
            base.join(next)
                .map(String::from)
                .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", next, e)))
        } else {
            Ok(self.config.rest_url(next))
        }
    }

    /// GET a URL under the retry policy and decode the JSON body.
    async fn get_json<T>(&self, url: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        self.retry
            .execute(|| {
                let request = self.client.get(url);
                async move {
                    let response = self.send(request).await?;
                    decode(response).await
                }
            })
            .await
    }

    /// Attach the auth header, send, and turn non-success statuses into errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<Response> {
        let response = request
            .header(AUTHORIZATION, format!("token {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status != StatusCode::TOO_MANY_REQUESTS {
            warn!("Snyk API error ({}): {}", status.as_u16(), message);
        }

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Decode a response body as JSON.
async fn decode<T>(response: Response) -> ApiResult<T>
where
    T: DeserializeOwned,
{
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
