use std::path::PathBuf;

use crate::diff::FileDiff;
use crate::fetch::SkippedItem;
use crate::issues::Issue;
use crate::pr::PullRequestDetails;

/// Pipeline progress. Stages only ever move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Empty,
    IdSet,
    DetailsFetched,
    DiffsAdded,
    IssuesAdded,
    Rendered,
    Persisted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Empty => "empty",
            Stage::IdSet => "id-set",
            Stage::DetailsFetched => "details-fetched",
            Stage::DiffsAdded => "diffs-added",
            Stage::IssuesAdded => "issues-added",
            Stage::Rendered => "rendered",
            Stage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Everything gathered during one run. Fields go from unset to set and are
/// never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingContext {
    pub pull_request_id: Option<u64>,
    pub details: Option<PullRequestDetails>,
    /// Same order as the PR's file changes
    pub diffs: Vec<FileDiff>,
    /// Same order as the references were first seen
    pub issues: Vec<Issue>,
    pub review_prompt: Option<String>,
    pub output_directory: Option<PathBuf>,
    pub output_file_name: Option<String>,
    /// Rendered Markdown
    pub document: Option<String>,
    /// Items dropped or degraded by soft failures
    pub skipped: Vec<SkippedItem>,
}

impl WorkingContext {
    /// `<output_directory>/PR-<id>`, where attachments and the document live.
    pub fn pr_folder(&self) -> Option<PathBuf> {
        let dir = self.output_directory.as_ref()?;
        let id = self.pull_request_id?;
        Some(dir.join(format!("PR-{id}")))
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        let name = self.output_file_name.as_deref().filter(|n| !n.is_empty())?;
        Some(self.pr_folder()?.join(name))
    }
}
