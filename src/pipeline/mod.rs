//! Drives one review-context run: resolve the pull request, diff its files,
//! enrich linked issues, render, persist. Each stage checks that the previous
//! one finished and leaves the context untouched when it refuses to run.

pub mod context;

pub use context::{Stage, WorkingContext};

use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, instrument, warn, Instrument};

use crate::config::ReviewConfig;
use crate::diff;
use crate::fetch::Cancelled;
use crate::issues::{self, IssueTracker};
use crate::pr::{self, PrError, SourceControl};
use crate::report::{self, RenderOptions, ReportError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Failed to write review document: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PrError> for PipelineError {
    fn from(err: PrError) -> Self {
        match err {
            PrError::NotFound { .. } => PipelineError::NotFound(err.to_string()),
            PrError::UpstreamUnavailable(msg) => PipelineError::UpstreamUnavailable(msg),
            PrError::Cancelled => PipelineError::Cancelled,
        }
    }
}

impl From<Cancelled> for PipelineError {
    fn from(_: Cancelled) -> Self {
        PipelineError::Cancelled
    }
}

impl From<ReportError> for PipelineError {
    fn from(err: ReportError) -> Self {
        PipelineError::PreconditionViolation(err.to_string())
    }
}

/// Single writer of a [`WorkingContext`] for one run.
pub struct ContextPipeline<'a> {
    source: &'a dyn SourceControl,
    tracker: &'a dyn IssueTracker,
    render_options: RenderOptions,
    concurrency: usize,
    token: CancellationToken,
    stage: Stage,
    ctx: WorkingContext,
}

impl<'a> ContextPipeline<'a> {
    pub fn new(
        source: &'a dyn SourceControl,
        tracker: &'a dyn IssueTracker,
        review: &ReviewConfig,
        token: CancellationToken,
    ) -> Self {
        let ctx = WorkingContext {
            review_prompt: Some(review.review_prompt.clone()).filter(|p| !p.trim().is_empty()),
            output_directory: Some(review.output_directory.clone())
                .filter(|d| !d.as_os_str().is_empty()),
            ..WorkingContext::default()
        };
        Self {
            source,
            tracker,
            render_options: RenderOptions {
                include_unchanged_lines: review.include_unchanged_lines_in_diff,
            },
            concurrency: review.max_concurrent_fetches.max(1),
            token,
            stage: Stage::Empty,
            ctx,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn context(&self) -> &WorkingContext {
        &self.ctx
    }

    pub fn into_context(self) -> WorkingContext {
        self.ctx
    }

    /// Run every stage in order. Returns where the document was written, or
    /// `None` when persistence was skipped.
    pub async fn run(&mut self, pull_request_id: u64) -> Result<Option<PathBuf>, PipelineError> {
        self.assemble(pull_request_id).await?;
        self.persist().await
    }

    /// Run every stage up to and including rendering, without writing.
    pub async fn assemble(&mut self, pull_request_id: u64) -> Result<&str, PipelineError> {
        let span = info_span!("review_context", pr = pull_request_id);
        async {
            self.set_pull_request_id(pull_request_id)?;
            self.fetch_details().await?;
            self.add_diffs().await?;
            self.add_issues().await?;
            self.render()
        }
        .instrument(span)
        .await?;
        Ok(self.ctx.document.as_deref().unwrap_or_default())
    }

    pub fn set_pull_request_id(&mut self, id: u64) -> Result<(), PipelineError> {
        self.require(Stage::Empty, "set the pull request id")?;
        if id == 0 {
            return Err(PipelineError::PreconditionViolation(
                "pull request id must be positive".to_string(),
            ));
        }
        self.ctx.pull_request_id = Some(id);
        self.stage = Stage::IdSet;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch_details(&mut self) -> Result<(), PipelineError> {
        self.require(Stage::IdSet, "fetch pull request details")?;
        self.check_cancelled()?;
        let id = self.id()?;

        let details = pr::resolve(self.source, id, &self.token).await?;
        info!(title = %details.title, files = details.changes.len(), "fetched pull request details");

        self.ctx.output_file_name = Some(format!("PR-{id}-review.md"));
        self.ctx.details = Some(details);
        self.stage = Stage::DetailsFetched;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn add_diffs(&mut self) -> Result<(), PipelineError> {
        self.require(Stage::DetailsFetched, "add diffs")?;
        self.check_cancelled()?;
        let details = self.details()?;

        let batch = diff::build_diffs(self.source, details, self.concurrency, &self.token).await?;
        let additions: usize = batch.diffs.iter().map(|d| d.additions()).sum();
        let deletions: usize = batch.diffs.iter().map(|d| d.deletions()).sum();
        info!(files = batch.diffs.len(), additions, deletions, skipped = batch.skipped.len(), "added diffs");

        self.ctx.diffs.extend(batch.diffs);
        self.ctx.skipped.extend(batch.skipped);
        self.stage = Stage::DiffsAdded;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn add_issues(&mut self) -> Result<(), PipelineError> {
        self.require(Stage::DiffsAdded, "add issues")?;
        self.check_cancelled()?;
        let attachment_dir = self.ctx.pr_folder().ok_or_else(|| {
            PipelineError::PreconditionViolation("output directory must be configured".to_string())
        })?;
        let details = self.details()?;

        let references = issues::extract(&details.description);
        info!(references = references.len(), "found issue references");
        let batch = issues::enrich_all(
            self.tracker,
            &references,
            &attachment_dir,
            self.concurrency,
            &self.token,
        )
        .await?;

        self.ctx.issues.extend(batch.issues);
        self.ctx.skipped.extend(batch.skipped);
        self.stage = Stage::IssuesAdded;
        Ok(())
    }

    pub fn render(&mut self) -> Result<(), PipelineError> {
        self.require(Stage::IssuesAdded, "render the document")?;
        let document = report::render(&self.ctx, self.render_options)?;
        self.ctx.document = Some(document);
        self.stage = Stage::Rendered;
        Ok(())
    }

    /// Write the rendered document. Skipped with a warning, not an error,
    /// when there is nothing to write or nowhere to write it; the document
    /// stays available through [`Self::context`] either way.
    #[instrument(skip(self))]
    pub async fn persist(&mut self) -> Result<Option<PathBuf>, PipelineError> {
        self.require(Stage::Rendered, "persist the document")?;
        let document = self.ctx.document.as_deref().unwrap_or_default();
        let (Some(folder), Some(path)) = (self.ctx.pr_folder(), self.ctx.output_path()) else {
            warn!("output directory or file name unknown, not writing review document");
            return Ok(None);
        };
        if document.is_empty() {
            warn!("rendered document is empty, not writing it");
            return Ok(None);
        }
        self.check_cancelled()?;

        tokio::fs::create_dir_all(&folder).await?;
        tokio::fs::write(&path, document).await?;
        info!(path = %path.display(), "review document written");
        self.stage = Stage::Persisted;
        Ok(Some(path))
    }

    fn require(&self, expected: Stage, action: &str) -> Result<(), PipelineError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(PipelineError::PreconditionViolation(format!(
                "cannot {action} at stage {}, expected {expected}",
                self.stage
            )))
        }
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn id(&self) -> Result<u64, PipelineError> {
        self.ctx.pull_request_id.ok_or_else(|| {
            PipelineError::PreconditionViolation("pull request id is not set".to_string())
        })
    }

    fn details(&self) -> Result<&pr::PullRequestDetails, PipelineError> {
        self.ctx.details.as_ref().ok_or_else(|| {
            PipelineError::PreconditionViolation("pull request details are not fetched".to_string())
        })
    }
}
