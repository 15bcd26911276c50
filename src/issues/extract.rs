use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::IssueReference;

/// Browse URLs such as `https://acme.atlassian.net/browse/ABC-123`.
/// Matching ignores case; keys are upper-cased afterwards.
static BROWSE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://[^\s/]+/browse/([A-Z]+-\d+)").expect("browse URL regex")
});

/// Find issue references in free text. Duplicates (ignoring case) are dropped,
/// first-seen order is kept.
pub fn extract(text: &str) -> Vec<IssueReference> {
    let mut seen = HashSet::new();
    BROWSE_URL_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|key| IssueReference::new(key.as_str()))
        .filter(|reference| seen.insert(reference.clone()))
        .collect()
}
