//! Jira REST (v2) implementation of [`IssueTracker`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::types::{RawAttachment, RawComment, RawIssue};
use super::IssueTracker;
use crate::fetch::FetchError;

const USER_AGENT: &str = concat!("review-context/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ISSUE_FIELDS: &str = "summary,description,attachment,comment";

pub struct JiraClient {
    http: Client,
    /// Attachments are served from their own URLs; same credential, separate client
    attachment_http: Client,
    base_url: String,
    user: String,
    token: String,
}

#[derive(Deserialize)]
struct IssueResponse {
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    attachment: Option<Vec<Value>>,
    #[serde(default)]
    comment: Option<CommentPage>,
}

#[derive(Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<Value>,
}

#[derive(Deserialize)]
struct AttachmentEntry {
    filename: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct CommentEntry {
    author: Author,
    body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    display_name: String,
}

impl JiraClient {
    /// `base_url` is the site root, e.g. `https://acme.atlassian.net`.
    pub fn new(base_url: &str, user: &str, token: &str) -> Result<Self, FetchError> {
        let build = || {
            Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()
        };
        Ok(Self {
            http: build()?,
            attachment_http: build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    #[instrument(skip(self))]
    async fn get_issue(&self, key: &str) -> Result<RawIssue, FetchError> {
        let url = format!("{}/rest/api/2/issue/{}", self.base_url, key);
        debug!("fetching issue from Jira");
        let response = self
            .http
            .get(&url)
            .query(&[("fields", ISSUE_FIELDS)])
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        let body = response.json::<IssueResponse>().await?;
        Ok(into_raw_issue(body.fields))
    }

    #[instrument(skip(self))]
    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .attachment_http
            .get(url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        debug!(bytes = bytes.len(), "downloaded attachment");
        Ok(bytes.to_vec())
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }
}

/// Entries are decoded one by one so a malformed attachment or comment only
/// loses itself.
fn into_raw_issue(fields: IssueFields) -> RawIssue {
    let attachments = fields
        .attachment
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value::<AttachmentEntry>(v).ok())
        .map(|a| RawAttachment {
            filename: a.filename,
            content_url: a.content,
        })
        .collect();
    let comments = fields
        .comment
        .map(|page| page.comments)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value::<CommentEntry>(v).ok())
        .map(|c| RawComment {
            author: Some(c.author.display_name),
            body: Some(c.body),
        })
        .collect();

    RawIssue {
        summary: fields.summary,
        description: fields.description,
        attachments,
        comments,
    }
}
