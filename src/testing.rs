//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::diff::{DiffLine, FileDiff};
use crate::fetch::FetchError;
use crate::issues::{Attachment, Comment, Issue, IssueTracker, RawAttachment, RawComment, RawIssue};
use crate::pipeline::WorkingContext;
use crate::pr::{ChangeKind, CommitDiff, FileChange, PullRequestDetails, RawChange, RawPullRequest, SourceControl};

#[derive(Default)]
pub struct FakeSourceControl {
    /// `None` makes `get_pull_request` answer NotFound
    pub pull_request: Option<RawPullRequest>,
    pub commit_diff: CommitDiff,
    pub fail_commit_diff: bool,
    /// Content requests never complete
    pub hang_content: bool,
    files: HashMap<(String, String), String>,
    failing_paths: HashSet<String>,
    diff_requests: Mutex<Vec<(String, String)>>,
    content_requests: Mutex<Vec<(String, String)>>,
}

impl FakeSourceControl {
    pub fn with_pr(changes: Vec<RawChange>) -> Self {
        Self {
            pull_request: Some(RawPullRequest {
                title: "Add login flow".to_string(),
                description: Some(
                    "Implements the login page\n\nhttps://acme.atlassian.net/browse/ABC-1".to_string(),
                ),
                source_ref_name: "refs/heads/feature/login".to_string(),
                target_ref_name: "refs/heads/main".to_string(),
                source_commit: "src111".to_string(),
                target_commit: "tgt222".to_string(),
            }),
            commit_diff: CommitDiff {
                base_commit: "base000".to_string(),
                changes,
            },
            ..Self::default()
        }
    }

    pub fn put_file(&mut self, path: &str, commit_id: &str, content: &str) {
        self.files
            .insert((path.to_string(), commit_id.to_string()), content.to_string());
    }

    /// Every content request for `path` fails with a transport error.
    pub fn fail_content_for(&mut self, path: &str) {
        self.failing_paths.insert(path.to_string());
    }

    /// `(base_ref, target_ref)` pairs passed to `get_commit_diff`
    pub fn diff_requests(&self) -> Vec<(String, String)> {
        self.diff_requests.lock().unwrap().clone()
    }

    /// `(path, commit_id)` pairs passed to `get_file_content_at`
    pub fn content_requests(&self) -> Vec<(String, String)> {
        self.content_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn get_pull_request(&self, id: u64) -> Result<RawPullRequest, FetchError> {
        self.pull_request
            .clone()
            .ok_or_else(|| FetchError::NotFound(format!("pullRequests/{id}")))
    }

    async fn get_commit_diff(&self, base_ref: &str, target_ref: &str) -> Result<CommitDiff, FetchError> {
        self.diff_requests
            .lock()
            .unwrap()
            .push((base_ref.to_string(), target_ref.to_string()));
        if self.fail_commit_diff {
            return Err(FetchError::Upstream("connection reset".to_string()));
        }
        Ok(self.commit_diff.clone())
    }

    async fn get_file_content_at(&self, path: &str, commit_id: &str) -> Result<String, FetchError> {
        self.content_requests
            .lock()
            .unwrap()
            .push((path.to_string(), commit_id.to_string()));
        if self.hang_content {
            std::future::pending::<()>().await;
        }
        if self.failing_paths.contains(path) {
            return Err(FetchError::Upstream("connection reset".to_string()));
        }
        self.files
            .get(&(path.to_string(), commit_id.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("{path}@{commit_id}")))
    }
}

#[derive(Default)]
pub struct FakeIssueTracker {
    pub issues: HashMap<String, RawIssue>,
    /// Keys whose lookup fails with a transport error
    pub failing_issues: HashSet<String>,
    /// Attachment bytes by content URL
    pub attachments: HashMap<String, Vec<u8>>,
}

impl FakeIssueTracker {
    /// ABC-1 with one image, one log, one attachment whose download fails,
    /// one attachment without metadata and a mix of valid and partial comments.
    pub fn with_sample_issue() -> Self {
        let mut tracker = Self::default();
        let attachment = |filename: Option<&str>, url: Option<&str>| RawAttachment {
            filename: filename.map(str::to_string),
            content_url: url.map(str::to_string),
        };
        let comment = |author: Option<&str>, body: Option<&str>| RawComment {
            author: author.map(str::to_string),
            body: body.map(str::to_string),
        };

        tracker.issues.insert(
            "ABC-1".to_string(),
            RawIssue {
                summary: Some("Login fails on Safari".to_string()),
                description: Some("{code}\nassert!(ok)\n{code}".to_string()),
                attachments: vec![
                    attachment(Some("screenshot.png"), Some("https://files/1")),
                    attachment(Some("trace.log"), Some("https://files/2")),
                    attachment(Some("broken.bin"), Some("https://files/3")),
                    attachment(None, Some("https://files/4")),
                ],
                comments: vec![
                    comment(Some("Dana"), Some("Reproduced on 17.2")),
                    comment(Some("Lee"), Some("")),
                    comment(None, Some("anonymous note")),
                ],
            },
        );
        tracker
            .attachments
            .insert("https://files/1".to_string(), b"PNGDATA".to_vec());
        tracker
            .attachments
            .insert("https://files/2".to_string(), b"at login.rs:3".to_vec());
        tracker
    }
}

#[async_trait]
impl IssueTracker for FakeIssueTracker {
    async fn get_issue(&self, key: &str) -> Result<RawIssue, FetchError> {
        if self.failing_issues.contains(key) {
            return Err(FetchError::Upstream("connection reset".to_string()));
        }
        self.issues
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("issue/{key}")))
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.attachments.get(url).cloned().ok_or(FetchError::Status {
            resource: url.to_string(),
            status: 500,
        })
    }

    fn browse_url(&self, key: &str) -> String {
        format!("https://acme.atlassian.net/browse/{key}")
    }
}

/// A context as it looks right before rendering.
pub fn sample_context() -> WorkingContext {
    WorkingContext {
        pull_request_id: Some(42),
        details: Some(PullRequestDetails {
            id: 42,
            title: "Add login flow".to_string(),
            description: "Implements the login page\n\nhttps://acme.atlassian.net/browse/ABC-1".to_string(),
            source_ref_name: "refs/heads/feature/login".to_string(),
            target_ref_name: "refs/heads/main".to_string(),
            source_commit: "src111".to_string(),
            target_commit: "tgt222".to_string(),
            base_commit: "base000".to_string(),
            changes: vec![FileChange {
                path: "/src/login.rs".to_string(),
                kind: ChangeKind::Modified,
                original_path: None,
            }],
        }),
        diffs: vec![FileDiff {
            path: "/src/login.rs".to_string(),
            lines: vec![
                DiffLine::unchanged("fn login() {\n"),
                DiffLine::removed("    old();\n"),
                DiffLine::added("    new();\n"),
                DiffLine::unchanged("}\n"),
            ],
        }],
        issues: vec![Issue {
            key: "ABC-1".to_string(),
            url: "https://acme.atlassian.net/browse/ABC-1".to_string(),
            summary: "Login fails on Safari".to_string(),
            description: "{code}\nassert!(ok)\n{code}".to_string(),
            attachments: vec![
                Attachment {
                    filename: "screenshot.PNG".to_string(),
                    url: "https://files/1".to_string(),
                    content: b"PNGDATA".to_vec(),
                },
                Attachment {
                    filename: "trace.log".to_string(),
                    url: "https://files/2".to_string(),
                    content: b"at login.rs:3".to_vec(),
                },
            ],
            comments: vec![Comment {
                author: "Dana".to_string(),
                body: "Reproduced on 17.2".to_string(),
            }],
        }],
        review_prompt: Some("Review for correctness.".to_string()),
        output_directory: Some(PathBuf::from("CodeReviews")),
        output_file_name: Some("PR-42-review.md".to_string()),
        document: None,
        skipped: vec![],
    }
}
