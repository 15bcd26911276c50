//! Azure DevOps Git REST implementation of [`SourceControl`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::types::{CommitDiff, RawChange, RawPullRequest};
use super::SourceControl;
use crate::fetch::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.2-preview";
const ITEMS_API_VERSION: &str = "7.2-preview.1";
const USER_AGENT: &str = concat!("review-context/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client bound to one repository.
pub struct AzureDevOpsClient {
    http: Client,
    /// `{base}/{organization}/{project}/_apis/git/repositories/{repository}`
    repo_url: String,
    personal_access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestResponse {
    title: String,
    description: Option<String>,
    source_ref_name: String,
    target_ref_name: String,
    last_merge_source_commit: CommitRef,
    last_merge_target_commit: CommitRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitRef {
    commit_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitDiffResponse {
    base_commit: String,
    #[serde(default)]
    changes: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeEntry {
    item: ChangeItem,
    #[serde(default)]
    change_type: String,
    original_path: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeItem {
    #[serde(default)]
    path: String,
    #[serde(default)]
    git_object_type: String,
}

impl AzureDevOpsClient {
    pub fn new(
        base_url: &str,
        organization: &str,
        project: &str,
        repository_id: &str,
        personal_access_token: &str,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            repo_url: format!(
                "{}/{}/{}/_apis/git/repositories/{}",
                base_url.trim_end_matches('/'),
                organization,
                project,
                repository_id
            ),
            personal_access_token: personal_access_token.to_string(),
        })
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/{}", self.repo_url, endpoint))
            .basic_auth("", Some(&self.personal_access_token))
    }
}

#[async_trait]
impl SourceControl for AzureDevOpsClient {
    #[instrument(skip(self))]
    async fn get_pull_request(&self, id: u64) -> Result<RawPullRequest, FetchError> {
        debug!("fetching PR metadata from Azure DevOps");
        let pr = self
            .get(&format!("pullRequests/{id}"))
            .query(&[("api-version", API_VERSION)])
            .send()
            .await?
            .error_for_status()?
            .json::<PullRequestResponse>()
            .await?;
        debug!(title = %pr.title, "received PR metadata");

        Ok(RawPullRequest {
            title: pr.title,
            description: pr.description,
            source_ref_name: pr.source_ref_name,
            target_ref_name: pr.target_ref_name,
            source_commit: pr.last_merge_source_commit.commit_id,
            target_commit: pr.last_merge_target_commit.commit_id,
        })
    }

    #[instrument(skip(self))]
    async fn get_commit_diff(
        &self,
        base_ref: &str,
        target_ref: &str,
    ) -> Result<CommitDiff, FetchError> {
        let diff = self
            .get("diffs/commits")
            .query(&[
                ("baseVersion", base_ref),
                ("targetVersion", target_ref),
                ("diffCommonCommit", "true"),
                ("api-version", API_VERSION),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<CommitDiffResponse>()
            .await?;

        let changes: Vec<RawChange> = diff
            .changes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<ChangeEntry>(v) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!(error = %err, "skipping malformed change entry");
                    None
                }
            })
            .map(|c| RawChange {
                path: c.item.path,
                change_type: c.change_type,
                object_type: c.item.git_object_type,
                original_path: c.original_path,
            })
            .collect();
        debug!(base_commit = %diff.base_commit, changes = changes.len(), "received base diff");

        Ok(CommitDiff {
            base_commit: diff.base_commit,
            changes,
        })
    }

    #[instrument(skip(self))]
    async fn get_file_content_at(&self, path: &str, commit_id: &str) -> Result<String, FetchError> {
        let text = self
            .get("items")
            .query(&[
                ("path", path),
                ("versionType", "commit"),
                ("version", commit_id),
                ("$format", "text"),
                ("api-version", ITEMS_API_VERSION),
            ])
            .header("Accept", "text/plain, application/octet-stream")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }
}
