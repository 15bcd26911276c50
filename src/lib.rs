//! Assemble a Markdown review document for an Azure DevOps pull request:
//! title and description, linked Jira issues with their attachments and
//! comments, per-file line diffs and a closing review prompt.

pub mod config;
pub mod diff;
pub mod fetch;
pub mod issues;
pub mod pipeline;
pub mod pr;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;
