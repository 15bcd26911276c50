use std::path::Path;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::diff::{FileDiff, LineKind};
use crate::issues::Issue;
use crate::pipeline::WorkingContext;

/// Extensions embedded as images rather than linked.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Cannot render review document: {0} is not set")]
    MissingInput(&'static str),
}

/// Knobs that change the rendered document.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Emit unchanged lines (prefixed with a space) inside the diff block
    pub include_unchanged_lines: bool,
}

/// Render the working context into the review Markdown document.
///
/// Layout, in order:
/// # <PR title>
/// <PR description>
/// ## JIRA: [KEY](url)   (one block per issue)
/// ## Diff               (fenced, omitted when there are no diffs)
/// ## Review Prompt
///
/// Pull-request details, output directory, output file name and review
/// prompt must all be set. The context is not modified.
#[instrument(skip_all, fields(pr = ctx.pull_request_id))]
pub fn render(ctx: &WorkingContext, options: RenderOptions) -> Result<String, ReportError> {
    let details = ctx
        .details
        .as_ref()
        .ok_or(ReportError::MissingInput("pull request details"))?;
    ctx.output_directory
        .as_ref()
        .ok_or(ReportError::MissingInput("output directory"))?;
    ctx.output_file_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ReportError::MissingInput("output file name"))?;
    let prompt = ctx
        .review_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or(ReportError::MissingInput("review prompt"))?;

    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", details.title));
    if !details.description.trim().is_empty() {
        md.push_str(&format!("{}\n\n", details.description));
    }

    for issue in &ctx.issues {
        write_issue(&mut md, issue);
    }

    if !ctx.diffs.is_empty() {
        md.push_str("## Diff\n\n```diff\n");
        for diff in &ctx.diffs {
            write_file_diff(&mut md, diff, options);
        }
        md.push_str("```\n\n");
    }

    md.push_str("## Review Prompt\n\n");
    md.push_str(prompt);
    md.push('\n');

    debug!(bytes = md.len(), issues = ctx.issues.len(), diffs = ctx.diffs.len(), "rendered review document");
    Ok(md)
}

fn write_issue(md: &mut String, issue: &Issue) {
    md.push_str(&format!("## JIRA: [{}]({})\n\n", issue.key, issue.url));
    md.push_str(&format!("**{}**\n\n", issue.summary));
    if !issue.description.trim().is_empty() {
        md.push_str(&format!("{}\n\n", wiki_to_markdown(&issue.description)));
    }

    if !issue.attachments.is_empty() {
        md.push_str("### Attachments\n");
        for att in &issue.attachments {
            if is_image(&att.filename) {
                md.push_str(&format!("![{0}]({0})\n", att.filename));
            } else {
                md.push_str(&format!("[Attachment: {0}]({0})\n", att.filename));
            }
        }
        md.push('\n');
    }

    if !issue.comments.is_empty() {
        md.push_str("### Comments\n");
        for comment in &issue.comments {
            md.push_str(&format!("- **{}**: {}\n", comment.author, comment.body));
        }
        md.push('\n');
    }
}

fn write_file_diff(md: &mut String, diff: &FileDiff, options: RenderOptions) {
    let path = if diff.path.starts_with('/') {
        diff.path.clone()
    } else {
        format!("/{}", diff.path)
    };
    md.push_str(&format!("diff --git a{path} b{path}\n"));
    md.push_str(&format!("--- a{path}\n"));
    md.push_str(&format!("+++ b{path}\n"));
    for line in &diff.lines {
        if line.kind == LineKind::Unchanged && !options.include_unchanged_lines {
            continue;
        }
        md.push(line.kind.marker());
        md.push_str(line.content());
        md.push('\n');
    }
    md.push('\n');
}

/// Only code and no-format blocks are translated; other wiki markup is left as is.
fn wiki_to_markdown(text: &str) -> String {
    text.replace("{code}", "```").replace("{noformat}", "```")
}

fn is_image(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
