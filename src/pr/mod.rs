pub mod azure;
pub mod types;

pub use types::{ChangeKind, CommitDiff, FileChange, PullRequestDetails, RawChange, RawPullRequest};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::fetch::{cancellable, FetchError};

/// Branch namespace stripped from ref names before a base-diff request.
const BRANCH_REF_PREFIX: &str = "refs/heads/";

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Pull request {id} could not be fetched: {reason}")]
    NotFound { id: u64, reason: String },

    #[error("Source control unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Pull request resolution cancelled")]
    Cancelled,
}

impl PrError {
    fn from_fetch(id: u64, err: FetchError) -> Self {
        match err {
            FetchError::NotFound(_) | FetchError::Status { .. } => PrError::NotFound {
                id,
                reason: err.to_string(),
            },
            FetchError::Upstream(msg) => PrError::UpstreamUnavailable(msg),
            FetchError::Cancelled => PrError::Cancelled,
        }
    }
}

/// The three source-control operations the pipeline needs. Authentication,
/// base URLs and API versions stay behind the implementation.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn get_pull_request(&self, id: u64) -> Result<RawPullRequest, FetchError>;

    /// Diff between two refs, including their merge-base commit.
    async fn get_commit_diff(
        &self,
        base_ref: &str,
        target_ref: &str,
    ) -> Result<CommitDiff, FetchError>;

    /// File content at a commit. `FetchError::NotFound` when the file does not
    /// exist there.
    async fn get_file_content_at(&self, path: &str, commit_id: &str) -> Result<String, FetchError>;
}

/// Strip the branch namespace from a ref name ("refs/heads/main" -> "main").
pub fn clean_ref_name(ref_name: &str) -> &str {
    ref_name.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(ref_name)
}

/// Resolve a pull request id into canonical details.
///
/// The merge-base commit and change list come from a base-diff request
/// between the cleaned target (base) and source refs; the stored details keep
/// the refs exactly as reported.
#[instrument(skip(source, token))]
pub async fn resolve(
    source: &dyn SourceControl,
    id: u64,
    token: &CancellationToken,
) -> Result<PullRequestDetails, PrError> {
    debug!("fetching pull request metadata");
    let raw = cancellable(token, source.get_pull_request(id))
        .await
        .map_err(|e| PrError::from_fetch(id, e))?;

    let source_ref = clean_ref_name(&raw.source_ref_name);
    let target_ref = clean_ref_name(&raw.target_ref_name);
    debug!(%source_ref, %target_ref, "requesting base diff");
    let commit_diff = cancellable(token, source.get_commit_diff(target_ref, source_ref))
        .await
        .map_err(|e| PrError::from_fetch(id, e))?;

    if commit_diff.changes.is_empty() {
        warn!("base diff reported no changes");
    }
    let changes = normalize_changes(commit_diff.changes);
    debug!(base_commit = %commit_diff.base_commit, files = changes.len(), "resolved change list");

    Ok(PullRequestDetails {
        id,
        title: raw.title,
        description: raw.description.unwrap_or_default(),
        source_ref_name: raw.source_ref_name,
        target_ref_name: raw.target_ref_name,
        source_commit: raw.source_commit,
        target_commit: raw.target_commit,
        base_commit: commit_diff.base_commit,
        changes,
    })
}

/// Keep file entries only and map vendor change types onto `ChangeKind`.
fn normalize_changes(raw: Vec<RawChange>) -> Vec<FileChange> {
    raw.into_iter()
        .filter(|c| c.object_type == "blob" && !c.path.is_empty())
        .map(|c| FileChange {
            kind: ChangeKind::from_vendor(&c.change_type),
            original_path: c.original_path.filter(|p| !p.is_empty()),
            path: c.path,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSourceControl;

    fn change(path: &str, change_type: &str, object_type: &str) -> RawChange {
        RawChange {
            path: path.to_string(),
            change_type: change_type.to_string(),
            object_type: object_type.to_string(),
            original_path: None,
        }
    }

    #[test]
    fn test_clean_ref_name() {
        assert_eq!(clean_ref_name("refs/heads/feature/login"), "feature/login");
        assert_eq!(clean_ref_name("main"), "main");
        assert_eq!(clean_ref_name("refs/tags/v1"), "refs/tags/v1");
    }

    #[tokio::test]
    async fn test_resolve_cleans_refs_for_diff_but_keeps_originals() {
        let source = FakeSourceControl::with_pr(vec![change("/src/a.rs", "edit", "blob")]);
        let details = resolve(&source, 42, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            source.diff_requests(),
            vec![("main".to_string(), "feature/login".to_string())]
        );
        assert_eq!(details.source_ref_name, "refs/heads/feature/login");
        assert_eq!(details.target_ref_name, "refs/heads/main");
        assert_eq!(details.base_commit, "base000");
        assert_eq!(details.id, 42);
    }

    #[tokio::test]
    async fn test_resolve_drops_trees_and_normalizes_kinds() {
        let source = FakeSourceControl::with_pr(vec![
            change("/src", "edit", "tree"),
            change("/src/new.rs", "add", "blob"),
            change("/src/old.rs", "delete", "blob"),
            change("/src/moved.rs", "edit, rename", "blob"),
            change("", "edit", "blob"),
        ]);
        let details = resolve(&source, 1, &CancellationToken::new()).await.unwrap();

        let summary: Vec<(&str, ChangeKind)> = details
            .changes
            .iter()
            .map(|c| (c.path.as_str(), c.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/src/new.rs", ChangeKind::Added),
                ("/src/old.rs", ChangeKind::Deleted),
                ("/src/moved.rs", ChangeKind::Renamed),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_empty_change_list_is_not_an_error() {
        let source = FakeSourceControl::with_pr(vec![]);
        let details = resolve(&source, 7, &CancellationToken::new()).await.unwrap();
        assert!(details.changes.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_missing_description_becomes_empty() {
        let mut source = FakeSourceControl::with_pr(vec![]);
        source.pull_request.as_mut().unwrap().description = None;
        let details = resolve(&source, 7, &CancellationToken::new()).await.unwrap();
        assert_eq!(details.description, "");
    }

    #[tokio::test]
    async fn test_resolve_unknown_pr_is_not_found() {
        let source = FakeSourceControl::default();
        let err = resolve(&source, 99, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PrError::NotFound { id: 99, .. }));
    }

    #[tokio::test]
    async fn test_resolve_transport_failure_is_upstream_unavailable() {
        let mut source = FakeSourceControl::with_pr(vec![]);
        source.fail_commit_diff = true;
        let err = resolve(&source, 3, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PrError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_observes_cancellation() {
        let source = FakeSourceControl::with_pr(vec![]);
        let token = CancellationToken::new();
        token.cancel();
        let err = resolve(&source, 3, &token).await.unwrap_err();
        assert!(matches!(err, PrError::Cancelled));
    }
}
