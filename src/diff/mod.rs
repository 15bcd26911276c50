pub mod lines;
pub mod types;

pub use lines::diff_lines;
pub use types::{DiffLine, FileDiff, LineKind};

use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::fetch::{cancellable, Cancelled, FetchError, SkipScope, SkippedItem};
use crate::pr::{ChangeKind, FileChange, PullRequestDetails, SourceControl};

/// Diffs for every changed file plus the content fetches that failed softly.
#[derive(Debug, Default)]
pub struct DiffBatch {
    /// One entry per `FileChange`, in the same order
    pub diffs: Vec<FileDiff>,
    pub skipped: Vec<SkippedItem>,
}

/// Outcome of fetching one side of a file.
#[derive(Debug)]
enum SideContent {
    Loaded(String),
    /// Not present at that commit, or not expected to be (added/deleted)
    Absent,
    Failed(FetchError),
}

/// Build one line diff per changed file.
///
/// "Before" content is read at the merge-base commit, "after" content at the
/// source commit. Failed fetches degrade to empty content and are reported in
/// `DiffBatch::skipped`; only cancellation aborts the batch. Up to
/// `concurrency` files are fetched at once and results keep input order.
#[instrument(skip_all, fields(pr = details.id, files = details.changes.len()))]
pub async fn build_diffs(
    source: &dyn SourceControl,
    details: &PullRequestDetails,
    concurrency: usize,
    token: &CancellationToken,
) -> Result<DiffBatch, Cancelled> {
    if details.changes.is_empty() {
        info!("no file changes to diff");
        return Ok(DiffBatch::default());
    }

    let per_file: Vec<(FileDiff, Vec<SkippedItem>)> = stream::iter(&details.changes)
        .map(|change| diff_file(source, details, change, token))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut batch = DiffBatch::default();
    for (diff, skipped) in per_file {
        debug!(path = %diff.path, additions = diff.additions(), deletions = diff.deletions(), "diffed file");
        batch.diffs.push(diff);
        batch.skipped.extend(skipped);
    }
    Ok(batch)
}

async fn diff_file(
    source: &dyn SourceControl,
    details: &PullRequestDetails,
    change: &FileChange,
    token: &CancellationToken,
) -> Result<(FileDiff, Vec<SkippedItem>), Cancelled> {
    let before_path = match change.kind {
        ChangeKind::Renamed => change.original_path.as_deref().unwrap_or(&change.path),
        _ => &change.path,
    };

    let before = if change.kind == ChangeKind::Added {
        SideContent::Absent
    } else {
        fetch_side(source, before_path, &details.base_commit, token).await?
    };
    let after = if change.kind == ChangeKind::Deleted {
        SideContent::Absent
    } else {
        fetch_side(source, &change.path, &details.source_commit, token).await?
    };

    let mut skipped = Vec::new();
    let before = into_text(before, &change.path, &details.base_commit, &mut skipped);
    let after = into_text(after, &change.path, &details.source_commit, &mut skipped);

    let diff = FileDiff {
        path: change.path.clone(),
        lines: diff_lines(&before, &after),
    };
    Ok((diff, skipped))
}

async fn fetch_side(
    source: &dyn SourceControl,
    path: &str,
    commit_id: &str,
    token: &CancellationToken,
) -> Result<SideContent, Cancelled> {
    match cancellable(token, source.get_file_content_at(path, commit_id)).await {
        Ok(text) => Ok(SideContent::Loaded(text)),
        Err(FetchError::NotFound(_)) => Ok(SideContent::Absent),
        Err(FetchError::Cancelled) => Err(Cancelled),
        Err(err) => Ok(SideContent::Failed(err)),
    }
}

fn into_text(side: SideContent, path: &str, commit_id: &str, skipped: &mut Vec<SkippedItem>) -> String {
    match side {
        SideContent::Loaded(text) => text,
        SideContent::Absent => {
            debug!(%path, %commit_id, "no content at commit");
            String::new()
        }
        SideContent::Failed(err) => {
            warn!(%path, %commit_id, error = %err, "failed to fetch file content, using empty content");
            skipped.push(SkippedItem::new(
                SkipScope::FileContent,
                path,
                format!("{commit_id}: {err}"),
            ));
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::RawChange;
    use crate::testing::FakeSourceControl;

    fn file(path: &str, kind: ChangeKind) -> FileChange {
        FileChange {
            path: path.to_string(),
            kind,
            original_path: None,
        }
    }

    fn details(changes: Vec<FileChange>) -> PullRequestDetails {
        PullRequestDetails {
            id: 42,
            title: "Add login flow".to_string(),
            description: String::new(),
            source_ref_name: "refs/heads/feature/login".to_string(),
            target_ref_name: "refs/heads/main".to_string(),
            source_commit: "src111".to_string(),
            target_commit: "tgt222".to_string(),
            base_commit: "base000".to_string(),
            changes,
        }
    }

    fn source_with_files() -> FakeSourceControl {
        let mut source = FakeSourceControl::with_pr(Vec::<RawChange>::new());
        source.put_file("/a.rs", "base000", "one\ntwo\n");
        source.put_file("/a.rs", "src111", "one\n2\n");
        source.put_file("/b.rs", "base000", "b\n");
        source.put_file("/b.rs", "src111", "b!\n");
        source.put_file("/c.rs", "base000", "c\n");
        source.put_file("/c.rs", "src111", "c\nc2\n");
        source
    }

    #[tokio::test]
    async fn test_diffs_follow_change_order() {
        let source = source_with_files();
        let details = details(vec![
            file("/c.rs", ChangeKind::Modified),
            file("/a.rs", ChangeKind::Modified),
        ]);
        let batch = build_diffs(&source, &details, 4, &CancellationToken::new())
            .await
            .unwrap();

        let paths: Vec<&str> = batch.diffs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["/c.rs", "/a.rs"]);
        assert_eq!(batch.diffs[1].before(), "one\ntwo\n");
        assert_eq!(batch.diffs[1].after(), "one\n2\n");
        assert!(batch.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_failed_file_degrades_to_empty_and_batch_completes() {
        let mut source = source_with_files();
        source.fail_content_for("/b.rs");
        let details = details(vec![
            file("/a.rs", ChangeKind::Modified),
            file("/b.rs", ChangeKind::Modified),
            file("/c.rs", ChangeKind::Modified),
        ]);
        let batch = build_diffs(&source, &details, 1, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(batch.diffs.len(), 3);
        assert!(batch.diffs[1].lines.is_empty());
        assert_eq!(batch.diffs[1].before(), "");
        assert_eq!(batch.diffs[1].after(), "");
        assert_eq!(batch.diffs[2].after(), "c\nc2\n");
        assert_eq!(batch.skipped.len(), 2);
        assert!(batch
            .skipped
            .iter()
            .all(|s| s.item == "/b.rs" && s.scope == SkipScope::FileContent));
    }

    #[tokio::test]
    async fn test_added_and_deleted_files_skip_the_missing_side() {
        let mut source = source_with_files();
        source.put_file("/new.rs", "src111", "fresh\n");
        source.put_file("/old.rs", "base000", "stale\n");
        let details = details(vec![
            file("/new.rs", ChangeKind::Added),
            file("/old.rs", ChangeKind::Deleted),
        ]);
        let batch = build_diffs(&source, &details, 2, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(batch.diffs[0].after(), "fresh\n");
        assert_eq!(batch.diffs[0].additions(), 1);
        assert_eq!(batch.diffs[1].before(), "stale\n");
        assert_eq!(batch.diffs[1].deletions(), 1);
        let requested = source.content_requests();
        assert!(!requested.contains(&("/new.rs".to_string(), "base000".to_string())));
        assert!(!requested.contains(&("/old.rs".to_string(), "src111".to_string())));
    }

    #[tokio::test]
    async fn test_not_found_content_is_empty_without_skip() {
        let source = source_with_files();
        let details = details(vec![file("/ghost.rs", ChangeKind::Modified)]);
        let batch = build_diffs(&source, &details, 1, &CancellationToken::new())
            .await
            .unwrap();
        assert!(batch.diffs[0].lines.is_empty());
        assert!(batch.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_renamed_file_reads_before_from_original_path() {
        let mut source = source_with_files();
        source.put_file("/moved.rs", "src111", "one\ntwo\n");
        let details = details(vec![FileChange {
            path: "/moved.rs".to_string(),
            kind: ChangeKind::Renamed,
            original_path: Some("/a.rs".to_string()),
        }]);
        let batch = build_diffs(&source, &details, 1, &CancellationToken::new())
            .await
            .unwrap();
        assert!(batch.diffs[0]
            .lines
            .iter()
            .all(|l| l.kind == LineKind::Unchanged));
        assert_eq!(batch.diffs[0].path, "/moved.rs");
    }

    #[tokio::test]
    async fn test_empty_change_list_yields_empty_batch() {
        let source = source_with_files();
        let batch = build_diffs(&source, &details(vec![]), 4, &CancellationToken::new())
            .await
            .unwrap();
        assert!(batch.diffs.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_batch() {
        let source = source_with_files();
        let token = CancellationToken::new();
        token.cancel();
        let res = build_diffs(&source, &details(vec![file("/a.rs", ChangeKind::Modified)]), 1, &token).await;
        assert_eq!(res.unwrap_err(), Cancelled);
    }
}
