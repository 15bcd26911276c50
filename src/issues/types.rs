/// Key of an issue referenced from free text (e.g., "ABC-123").
/// Keys are stored upper-cased, so equality is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueReference(String);

impl IssueReference {
    pub fn new(key: &str) -> Self {
        Self(key.to_ascii_uppercase())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An issue with everything the review document shows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    /// Human-facing page for the issue
    pub url: String,
    pub summary: String,
    pub description: String,
    /// Downloaded attachments, in tracker order
    pub attachments: Vec<Attachment>,
    /// Comments, in tracker order
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// Issue fields as returned by the issue-tracker collaborator.
#[derive(Debug, Clone, Default)]
pub struct RawIssue {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub attachments: Vec<RawAttachment>,
    pub comments: Vec<RawComment>,
}

#[derive(Debug, Clone, Default)]
pub struct RawAttachment {
    pub filename: Option<String>,
    pub content_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawComment {
    pub author: Option<String>,
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_equality_ignores_case() {
        assert_eq!(IssueReference::new("abc-1"), IssueReference::new("ABC-1"));
        assert_eq!(IssueReference::new("abc-1").key(), "ABC-1");
        assert_eq!(IssueReference::new("Abc-1").to_string(), "ABC-1");
    }
}
