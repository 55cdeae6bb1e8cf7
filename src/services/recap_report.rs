//! Recap report rendering and write-back.

use crate::error::AppError;
use crate::models::settings::DEFAULT_RECAP_FILE_PATH;
use crate::models::{GitHubRecapStats, RolloverSettings};
use crate::services::github_client::GitHubClient;
use crate::services::notes::{NoteHandle, NoteStore};
use crate::services::pr_aggregator::{fetch_github_recap, fetch_github_yearly_recap};
use chrono::NaiveDate;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Window a recap covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecapPeriod {
    /// `month` is 1-based.
    Month { month: u32, year: i32 },
    Year(i32),
}

impl RecapPeriod {
    /// Human title such as `May 2024` or `2024`.
    pub fn title(&self) -> Result<String, AppError> {
        match *self {
            RecapPeriod::Month { month, year } => {
                let name = month
                    .checked_sub(1)
                    .and_then(|i| MONTH_NAMES.get(i as usize))
                    .ok_or_else(|| {
                        AppError::invalid_input_field("Month must be between 1 and 12", "month")
                    })?;
                Ok(format!("{} {}", name, year))
            }
            RecapPeriod::Year(year) => Ok(year.to_string()),
        }
    }
}

/// Render recap stats as a markdown report.
pub fn render_recap_markdown(
    stats: &GitHubRecapStats,
    period_title: &str,
    generated_on: NaiveDate,
) -> String {
    let mut out = format!("# GitHub Recap - {}\n\n", period_title);
    out.push_str("## Summary\n");
    for (label, value) in [
        ("PRs Opened", stats.prs_opened),
        ("PRs Merged", stats.prs_merged),
        ("PRs Reviewed", stats.prs_reviewed),
        ("Review Comments", stats.review_comments),
        ("Issues Opened", stats.issues_opened),
        ("Issues Closed", stats.issues_closed),
    ] {
        out.push_str(&format!("- **{}:** {}\n", label, value));
    }

    if let Some(repo) = &stats.most_active_repo {
        out.push_str("\n## Most Active Repository\n");
        out.push_str(&format!(
            "`{}` - {} contributions\n",
            repo, stats.most_active_repo_count
        ));
    }

    if !stats.pr_list.is_empty() {
        out.push_str("\n## Pull Requests\n");
        for pr in &stats.pr_list {
            if pr.repo.is_empty() {
                out.push_str(&format!("- [{}]({})\n", pr.title, pr.url));
            } else {
                out.push_str(&format!("- [{}]({}) (`{}`)\n", pr.title, pr.url, pr.repo));
            }
        }
    }

    out.push_str(&format!(
        "\n---\n*Generated on {}*\n",
        generated_on.format("%Y-%m-%d")
    ));
    out
}

/// Create or overwrite the report note at the configured path.
pub async fn write_recap_report(
    store: &dyn NoteStore,
    settings: &RolloverSettings,
    content: &str,
) -> Result<NoteHandle, AppError> {
    let path = match settings.github_recap_file_path.trim() {
        "" => DEFAULT_RECAP_FILE_PATH,
        path => path,
    };

    if store.exists(path).await? {
        let note = NoteHandle::new(path);
        store.modify(&note, content).await?;
        log::info!("[recap] updated GitHub recap at {}", path);
        Ok(note)
    } else {
        let note = store.create(path, content).await?;
        log::info!("[recap] created GitHub recap at {}", path);
        Ok(note)
    }
}

/// Fetch, render and write the recap for `period`.
pub async fn generate_recap_report(
    client: &GitHubClient,
    store: &dyn NoteStore,
    settings: &RolloverSettings,
    period: RecapPeriod,
    generated_on: NaiveDate,
) -> Result<NoteHandle, AppError> {
    let title = period.title()?;
    log::info!("[recap] generating GitHub recap for {}", title);

    let stats = match period {
        RecapPeriod::Month { month, year } => {
            fetch_github_recap(client, settings, month, year).await?
        }
        RecapPeriod::Year(year) => fetch_github_yearly_recap(client, settings, year).await?,
    };

    let content = render_recap_markdown(&stats, &title, generated_on);
    write_recap_report(store, settings, &content).await
}
