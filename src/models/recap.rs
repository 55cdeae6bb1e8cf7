//! Contribution recap models.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Read-only projection of a pull request for recap listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrInfo {
    pub title: String,
    pub url: String,
    /// Repository as `owner/repo`.
    pub repo: String,
}

/// Aggregated activity for one month or one year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubRecapStats {
    pub prs_opened: u32,
    pub prs_merged: u32,
    pub prs_reviewed: u32,
    pub review_comments: u32,
    pub issues_opened: u32,
    pub issues_closed: u32,

    /// Repository with the most contributions, first-seen wins on ties.
    pub most_active_repo: Option<String>,
    pub most_active_repo_count: u32,

    /// PRs opened in the window.
    pub pr_list: Vec<PrInfo>,

    /// Contributions per repository in first-encountered order.
    pub repo_contributions: IndexMap<String, u32>,
}

impl GitHubRecapStats {
    /// Count one contribution to `repo`.
    pub fn record_contribution(&mut self, repo: &str) {
        *self.repo_contributions.entry(repo.to_string()).or_insert(0) += 1;
    }

    /// Recompute `most_active_repo` from `repo_contributions`.
    pub fn refresh_most_active(&mut self) {
        match most_active_repo(&self.repo_contributions) {
            Some((repo, count)) => {
                self.most_active_repo = Some(repo);
                self.most_active_repo_count = count;
            }
            None => {
                self.most_active_repo = None;
                self.most_active_repo_count = 0;
            }
        }
    }

    /// Add another window's counters, PR list and tallies into this one.
    ///
    /// The most-active repository is not refreshed here.
    pub fn absorb(&mut self, other: GitHubRecapStats) {
        self.prs_opened += other.prs_opened;
        self.prs_merged += other.prs_merged;
        self.prs_reviewed += other.prs_reviewed;
        self.review_comments += other.review_comments;
        self.issues_opened += other.issues_opened;
        self.issues_closed += other.issues_closed;
        self.pr_list.extend(other.pr_list);
        for (repo, count) in other.repo_contributions {
            *self.repo_contributions.entry(repo).or_insert(0) += count;
        }
    }
}

/// The repository with the highest count; the first one seen wins ties.
pub fn most_active_repo(contributions: &IndexMap<String, u32>) -> Option<(String, u32)> {
    let mut best: Option<(&String, u32)> = None;
    for (repo, &count) in contributions {
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((repo, count)),
        }
    }
    best.map(|(repo, count)| (repo.clone(), count))
}
