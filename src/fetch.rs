//! Shared plumbing for talking to the source-control and issue-tracker
//! collaborators: the error both of them return, the record kept for every
//! item that was skipped after a soft failure, and cancellation.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{resource} returned HTTP {status}")]
    Status { resource: String, status: u16 },

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let resource = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "request".to_string());
        match err.status() {
            Some(status) if status == reqwest::StatusCode::NOT_FOUND => {
                FetchError::NotFound(resource)
            }
            Some(status) => FetchError::Status {
                resource,
                status: status.as_u16(),
            },
            None => FetchError::Upstream(err.to_string()),
        }
    }
}

/// Cooperative cancellation observed by a batch stage. Batch stages absorb
/// every other failure, so this is the only error they return.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Which kind of item a soft failure dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipScope {
    FileContent,
    Issue,
    Attachment,
}

impl std::fmt::Display for SkipScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipScope::FileContent => write!(f, "file content"),
            SkipScope::Issue => write!(f, "issue"),
            SkipScope::Attachment => write!(f, "attachment"),
        }
    }
}

/// An item that failed softly and was degraded or left out of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub scope: SkipScope,
    /// File path, issue key, or attachment filename
    pub item: String,
    pub reason: String,
}

impl SkippedItem {
    pub fn new(scope: SkipScope, item: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            scope,
            item: item.into(),
            reason: reason.to_string(),
        }
    }
}

/// Race `fut` against `token`. Cancellation wins ties so a cancelled run never
/// starts another request.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(FetchError::Cancelled),
        res = fut => res,
    }
}
