//! Rollover settings snapshot.
//!
//! The host owns and persists these values; the core only reads them.
//! Field names follow the host's persisted JSON (`camelCase`) so a settings
//! file written by the host can be loaded directly.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default heading that receives rolled-over tasks.
pub const DEFAULT_TARGET_HEADING: &str = "## Tasks";

/// Default archive folder name.
pub const DEFAULT_ARCHIVE_FOLDER: &str = "archive";

/// Default recap report path.
pub const DEFAULT_RECAP_FILE_PATH: &str = "GitHub Recap.md";

/// Settings for the rollover and the GitHub integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolloverSettings {
    /// Heading where unchecked tasks are inserted (e.g. `## Tasks`).
    pub target_section_heading: String,

    /// Folder, relative to the daily-note folder, that receives processed notes.
    pub archive_folder_name: String,

    /// Personal access token.
    pub github_token: String,

    /// Login of the user whose PRs and review requests are tracked.
    pub github_username: String,

    /// Comma-separated repositories (`owner/repo` or GitHub URLs).
    pub github_repos: String,

    /// Repositories entered one per row.
    pub github_repositories: Vec<String>,

    /// Heading for review requests.
    pub github_section_heading: String,

    /// Heading for the user's own open and merged PRs.
    #[serde(rename = "githubOpenPRsHeading")]
    pub github_open_prs_heading: String,

    /// Heading for PRs carrying a tracked label.
    #[serde(rename = "githubLabeledPRsHeading")]
    pub github_labeled_prs_heading: String,

    /// Comma-separated label names.
    pub github_tracked_labels: String,

    pub enable_github_integration: bool,

    /// Section headings whose tasks are never rolled over.
    pub skipped_task_extraction_sections: Vec<String>,

    /// Vault-relative path of the recap report.
    pub github_recap_file_path: String,

    /// Recap across every repository instead of the configured list.
    pub github_recap_all_repos: bool,
}

impl Default for RolloverSettings {
    fn default() -> Self {
        Self {
            target_section_heading: DEFAULT_TARGET_HEADING.to_string(),
            archive_folder_name: DEFAULT_ARCHIVE_FOLDER.to_string(),
            github_token: String::new(),
            github_username: String::new(),
            github_repos: String::new(),
            github_repositories: Vec::new(),
            github_section_heading: "## GitHub PRs".to_string(),
            github_open_prs_heading: "## My Open PRs".to_string(),
            github_labeled_prs_heading: "## Labeled PRs".to_string(),
            github_tracked_labels: String::new(),
            enable_github_integration: false,
            skipped_task_extraction_sections: vec!["#### -> Personal tasks".to_string()],
            github_recap_file_path: DEFAULT_RECAP_FILE_PATH.to_string(),
            github_recap_all_repos: false,
        }
    }
}

impl RolloverSettings {
    /// Load settings from a JSON file, using defaults for anything missing.
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("[settings] {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::from_json(&raw)
    }

    /// Parse settings from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::config(format!("Invalid settings file: {}", e)))
    }

    /// Whether both a token and a username are configured.
    pub fn has_github_credentials(&self) -> bool {
        !self.github_token.trim().is_empty() && !self.github_username.trim().is_empty()
    }

    /// Normalized `owner/repo` identifiers from both repository fields.
    ///
    /// Order is kept and duplicates are dropped. Entries without a `/` are
    /// kept here; repository-scoped queries skip them.
    pub fn repositories(&self) -> Vec<String> {
        let mut repos: Vec<String> = Vec::new();
        let entries = self
            .github_repos
            .split(',')
            .chain(self.github_repositories.iter().map(String::as_str));

        for entry in entries {
            let repo = normalize_repository(entry);
            if !repo.is_empty() && !repos.contains(&repo) {
                repos.push(repo);
            }
        }
        repos
    }

    /// Tracked label names, trimmed, empties dropped.
    pub fn tracked_labels(&self) -> Vec<String> {
        self.github_tracked_labels
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Extract `owner/repo` from a bare identifier or a URL containing
/// `github.com/owner/repo`.
pub fn normalize_repository(input: &str) -> String {
    let input = input.trim();

    if let Some(idx) = input.find("github.com/") {
        let rest = &input[idx + "github.com/".len()..];
        let mut parts = rest.split('/').filter(|p| !p.is_empty());
        if let (Some(owner), Some(repo)) = (parts.next(), parts.next()) {
            let repo = repo.trim_end_matches(".git");
            return format!("{}/{}", owner, repo);
        }
    }

    input.to_string()
}
