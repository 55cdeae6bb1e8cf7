//! Business logic services.
//!
//! This module contains the section model, task extraction, the GitHub
//! client and aggregator, and the rollover that ties them to note storage.
//!
//! Services take their collaborators (note store, locator, HTTP transport,
//! clock) as explicit arguments so they can be tested against fakes.

pub mod github_client;
pub mod heading_index;
pub mod notes;
pub mod pr_aggregator;
pub mod recap_report;
pub mod rollover;
pub mod sections;
pub mod task_extractor;

#[cfg(test)]
pub(crate) mod test_support;

pub use github_client::{GitHubClient, GitHubClientConfig};
pub use notes::{DailyNoteConfig, DailyNoteLocator, FsDailyNoteLocator, FsNoteStore, NoteHandle, NoteStore};
pub use pr_aggregator::{fetch_github_prs, fetch_github_recap, fetch_github_yearly_recap, GitHubPrItems};
pub use recap_report::{generate_recap_report, render_recap_markdown, write_recap_report, RecapPeriod};
pub use rollover::{rollover_unchecked_items, RolloverMode, RolloverOutcome, RolloverSummary, SkipReason};
