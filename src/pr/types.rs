/// Canonical metadata about a pull request, resolved once per run.
/// Note: not Deserialize. Built by the resolver from the collaborator's
/// raw pull request plus the base-diff response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDetails {
    /// PR id (e.g., 42)
    pub id: u64,
    /// PR title
    pub title: String,
    /// PR description, empty when the PR has none
    pub description: String,
    /// Source ref exactly as reported (e.g., "refs/heads/feature/login")
    pub source_ref_name: String,
    /// Target ref exactly as reported
    pub target_ref_name: String,
    /// Tip of the source branch
    pub source_commit: String,
    /// Tip of the target branch
    pub target_commit: String,
    /// Merge-base of source and target; "before" content is read here
    pub base_commit: String,
    /// Changed files, in the order the collaborator listed them
    pub changes: Vec<FileChange>,
}

/// Normalized change kind for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Normalize a vendor change type. Vendors report comma-separated flag
    /// lists such as "edit, rename"; delete beats add beats rename.
    /// Flags are compared whole, so "undelete" restores a file (added).
    pub fn from_vendor(raw: &str) -> ChangeKind {
        let flags: Vec<String> = raw
            .split(',')
            .map(|f| f.trim().to_ascii_lowercase())
            .collect();
        let has = |names: &[&str]| flags.iter().any(|f| names.contains(&f.as_str()));
        if has(&["delete"]) {
            ChangeKind::Deleted
        } else if has(&["add", "undelete"]) {
            ChangeKind::Added
        } else if has(&["rename", "sourcerename", "targetrename"]) {
            ChangeKind::Renamed
        } else {
            ChangeKind::Modified
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Renamed => write!(f, "renamed"),
        }
    }
}

/// A single changed file within the PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// File path as the vendor reports it; never empty
    pub path: String,
    pub kind: ChangeKind,
    /// Previous path for renames, when the vendor supplies it
    pub original_path: Option<String>,
}

/// Pull request fields as returned by the source-control collaborator.
#[derive(Debug, Clone, Default)]
pub struct RawPullRequest {
    pub title: String,
    pub description: Option<String>,
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub source_commit: String,
    pub target_commit: String,
}

/// Result of a base-diff request between two refs.
#[derive(Debug, Clone, Default)]
pub struct CommitDiff {
    pub base_commit: String,
    pub changes: Vec<RawChange>,
}

/// One entry of a base-diff response, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawChange {
    pub path: String,
    /// Vendor change type (e.g., "add", "edit, rename")
    pub change_type: String,
    /// "blob" for files, "tree" for directories
    pub object_type: String,
    pub original_path: Option<String>,
}
