pub mod extract;
pub mod jira;
pub mod types;

pub use extract::extract;
pub use types::{Attachment, Comment, Issue, IssueReference, RawAttachment, RawComment, RawIssue};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::fetch::{cancellable, Cancelled, FetchError, SkipScope, SkippedItem};

/// Issue-tracker operations the pipeline needs.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn get_issue(&self, key: &str) -> Result<RawIssue, FetchError>;

    /// Download attachment bytes. Implementations may use a different
    /// transport than `get_issue` but the same credential.
    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Page a reader opens to see the issue.
    fn browse_url(&self, key: &str) -> String;
}

/// Enriched issues plus everything that was left out along the way.
#[derive(Debug, Default)]
pub struct IssueBatch {
    /// Successfully enriched issues, in reference order
    pub issues: Vec<Issue>,
    pub skipped: Vec<SkippedItem>,
}

/// Enrich every reference. An issue that cannot be fetched is logged, recorded
/// in `IssueBatch::skipped` and left out; only cancellation aborts the batch.
#[instrument(skip_all, fields(references = references.len(), dir = %attachment_dir.display()))]
pub async fn enrich_all(
    tracker: &dyn IssueTracker,
    references: &[IssueReference],
    attachment_dir: &Path,
    concurrency: usize,
    token: &CancellationToken,
) -> Result<IssueBatch, Cancelled> {
    let outcomes: Vec<(&IssueReference, Result<(Issue, Vec<SkippedItem>), FetchError>)> =
        stream::iter(references)
            .map(|reference| async move {
                match enrich(tracker, reference, attachment_dir, token).await {
                    Err(FetchError::Cancelled) => Err(Cancelled),
                    other => Ok((reference, other)),
                }
            })
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

    let mut batch = IssueBatch::default();
    for (reference, outcome) in outcomes {
        match outcome {
            Ok((issue, skipped)) => {
                batch.issues.push(issue);
                batch.skipped.extend(skipped);
            }
            Err(err) => {
                warn!(issue = %reference, error = %err, "failed to fetch issue, leaving it out");
                batch
                    .skipped
                    .push(SkippedItem::new(SkipScope::Issue, reference.key(), err));
            }
        }
    }
    info!(issues = batch.issues.len(), skipped = batch.skipped.len(), "issues enriched");
    Ok(batch)
}

/// Fetch one issue, download its attachments into `attachment_dir` and keep
/// only well-formed comments. Attachment failures are soft and come back as
/// skipped items next to the issue.
#[instrument(skip(tracker, attachment_dir, token), fields(issue = %reference))]
pub async fn enrich(
    tracker: &dyn IssueTracker,
    reference: &IssueReference,
    attachment_dir: &Path,
    token: &CancellationToken,
) -> Result<(Issue, Vec<SkippedItem>), FetchError> {
    let key = reference.key();
    let raw = cancellable(token, tracker.get_issue(key)).await?;

    let mut skipped = Vec::new();
    let attachments =
        download_attachments(tracker, raw.attachments, attachment_dir, &mut skipped, token).await?;
    let comments: Vec<Comment> = raw
        .comments
        .into_iter()
        .filter_map(|c| match (c.author, c.body) {
            (Some(author), Some(body)) if !author.is_empty() && !body.is_empty() => {
                Some(Comment { author, body })
            }
            _ => None,
        })
        .collect();
    debug!(attachments = attachments.len(), comments = comments.len(), "issue fetched");

    let issue = Issue {
        key: key.to_string(),
        url: tracker.browse_url(key),
        summary: raw.summary.unwrap_or_else(|| "N/A".to_string()),
        description: raw.description.unwrap_or_default(),
        attachments,
        comments,
    };
    Ok((issue, skipped))
}

async fn download_attachments(
    tracker: &dyn IssueTracker,
    raw: Vec<RawAttachment>,
    dir: &Path,
    skipped: &mut Vec<SkippedItem>,
    token: &CancellationToken,
) -> Result<Vec<Attachment>, FetchError> {
    let mut attachments = Vec::new();
    if raw.is_empty() {
        return Ok(attachments);
    }
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %err, "cannot create attachment directory");
        for att in raw {
            if let Some(filename) = att.filename {
                skipped.push(SkippedItem::new(SkipScope::Attachment, filename, &err));
            }
        }
        return Ok(attachments);
    }

    for att in raw {
        let (filename, url) = match (att.filename, att.content_url) {
            (Some(f), Some(u)) if !f.is_empty() && !u.is_empty() => (f, u),
            _ => {
                debug!("attachment without filename or content URL, ignoring");
                continue;
            }
        };
        let Some(target) = attachment_path(dir, &filename) else {
            warn!(%filename, "attachment filename is not a plain file name");
            skipped.push(SkippedItem::new(SkipScope::Attachment, filename, "invalid file name"));
            continue;
        };

        let bytes = match cancellable(token, tracker.download_attachment(&url)).await {
            Ok(bytes) => bytes,
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(err) => {
                warn!(%filename, error = %err, "failed to download attachment");
                skipped.push(SkippedItem::new(SkipScope::Attachment, filename, err));
                continue;
            }
        };
        if let Err(err) = tokio::fs::write(&target, &bytes).await {
            warn!(path = %target.display(), error = %err, "failed to save attachment");
            skipped.push(SkippedItem::new(SkipScope::Attachment, filename, err));
            continue;
        }
        debug!(path = %target.display(), bytes = bytes.len(), "saved attachment");
        attachments.push(Attachment {
            filename,
            url,
            content: bytes,
        });
    }
    Ok(attachments)
}

/// `dir/<filename>`, refusing names that would escape `dir`.
fn attachment_path(dir: &Path, filename: &str) -> Option<PathBuf> {
    let name = Path::new(filename).file_name()?;
    (name == filename).then(|| dir.join(name))
}
