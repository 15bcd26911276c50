use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pr::azure::DEFAULT_BASE_URL;

/// Config file looked up in the current directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".review-context.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Top-level configuration loaded from .review-context.toml.
/// Every section has defaults so a partial file parses; `validate` decides
/// whether a run can start.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub azure_devops: AzureDevOpsConfig,

    #[serde(default)]
    pub jira: JiraConfig,

    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureDevOpsConfig {
    #[serde(default = "default_azure_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub repository_id: String,
    /// Falls back to AZURE_DEVOPS_PAT when unset.
    pub personal_access_token: Option<String>,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            base_url: default_azure_base_url(),
            organization: String::new(),
            project: String::new(),
            repository_id: String::new(),
            personal_access_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraConfig {
    /// Site root, e.g. https://acme.atlassian.net
    #[serde(default)]
    pub base_url: String,
    /// Falls back to JIRA_USER when unset.
    pub user: Option<String>,
    /// Falls back to JIRA_TOKEN when unset.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    /// Text appended at the end of every review document. Required.
    #[serde(default)]
    pub review_prompt: String,
    #[serde(default)]
    pub include_unchanged_lines_in_diff: bool,
    /// Files or issues fetched at once
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            review_prompt: String::new(),
            include_unchanged_lines_in_diff: false,
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

fn default_azure_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("CodeReviews")
}

fn default_max_concurrent_fetches() -> usize {
    4
}

impl Config {
    /// Load configuration from `path`, or from .review-context.toml in the
    /// current directory. A missing default file yields the default config;
    /// an explicitly given file must exist. Secrets left unset are filled
    /// from the environment.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill unset secrets through `lookup` (the process environment in `load`).
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.azure_devops.personal_access_token.is_none() {
            self.azure_devops.personal_access_token = lookup("AZURE_DEVOPS_PAT");
        }
        if self.jira.user.is_none() {
            self.jira.user = lookup("JIRA_USER");
        }
        if self.jira.token.is_none() {
            self.jira.token = lookup("JIRA_TOKEN");
        }
    }

    /// Check that everything a run needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 8] = [
            ("azure_devops.organization", self.azure_devops.organization.as_str()),
            ("azure_devops.project", self.azure_devops.project.as_str()),
            ("azure_devops.repository_id", self.azure_devops.repository_id.as_str()),
            (
                "azure_devops.personal_access_token",
                self.azure_devops.personal_access_token.as_deref().unwrap_or(""),
            ),
            ("jira.base_url", self.jira.base_url.as_str()),
            ("jira.user", self.jira.user.as_deref().unwrap_or("")),
            ("jira.token", self.jira.token.as_deref().unwrap_or("")),
            ("review.review_prompt", self.review.review_prompt.as_str()),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(ConfigError::Missing(*name)),
            None => Ok(()),
        }
    }
}
