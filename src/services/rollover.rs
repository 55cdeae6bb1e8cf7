//! Daily rollover.
//!
//! One run reads today's note, pulls unchecked tasks out of the most recent
//! daily note, optionally gathers GitHub PR items, writes today's note once
//! and finally archives the source note. The steps always run in that order.

use crate::error::AppError;
use crate::models::{RolloverSettings, Section};
use crate::services::github_client::GitHubClient;
use crate::services::heading_index::scan_blocks;
use crate::services::notes::{join_path, DailyNoteLocator, NoteHandle, NoteStore};
use crate::services::pr_aggregator::{fetch_github_prs, GitHubPrItems};
use crate::services::sections::{
    append_items_to_section, convert_sections_to_content, parse_sections, section_has_content,
};
use crate::services::task_extractor::extract_unchecked_items_from_sections;
use serde::Serialize;

/// What triggered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RolloverMode {
    /// Run from an explicit command; always proceeds.
    Forced,
    /// Run because a new daily note appeared; leaves populated notes alone.
    Automatic,
}

/// Why a run stopped without writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NoTodayNote,
    AlreadyPopulated,
    NothingToAdd,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::NoTodayNote => "today's note does not exist",
            SkipReason::AlreadyPopulated => "today's note is already populated",
            SkipReason::NothingToAdd => "nothing to roll over",
        };
        f.write_str(reason)
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloverSummary {
    /// Path of today's note.
    pub target: String,
    /// Path the tasks came from, if a previous note existed.
    pub source: Option<String>,
    pub tasks_moved: usize,
    pub review_items: usize,
    #[serde(rename = "openPRItems")]
    pub open_pr_items: usize,
    pub labeled_items: usize,
    /// Where the source note was archived to.
    pub archived_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "details", rename_all = "camelCase")]
pub enum RolloverOutcome {
    Skipped(SkipReason),
    Completed(RolloverSummary),
}

/// Whether today's note already has content in a section the run would fill.
fn already_populated(text: &str, settings: &RolloverSettings) -> bool {
    if section_has_content(text, &settings.target_section_heading) {
        return true;
    }

    settings.enable_github_integration
        && [
            &settings.github_section_heading,
            &settings.github_open_prs_heading,
            &settings.github_labeled_prs_heading,
        ]
        .into_iter()
        .any(|heading| section_has_content(text, heading))
}

fn parse_note(text: &str) -> Vec<Section> {
    parse_sections(text, &scan_blocks(text))
}

/// Folder that receives archived daily notes.
pub fn archive_folder(daily_folder: &str, settings: &RolloverSettings) -> String {
    let name = settings.archive_folder_name.trim().trim_matches('/');
    let name = if name.is_empty() {
        crate::models::settings::DEFAULT_ARCHIVE_FOLDER
    } else {
        name
    };
    join_path(daily_folder, name)
}

/// Move `note` into the archive folder, keeping its file name.
pub async fn archive_note(
    store: &dyn NoteStore,
    daily_folder: &str,
    settings: &RolloverSettings,
    note: &NoteHandle,
) -> Result<NoteHandle, AppError> {
    let folder = archive_folder(daily_folder, settings);
    if !store.exists(&folder).await? {
        log::debug!("[rollover] creating archive folder {}", folder);
        store.create_folder(&folder).await?;
    }

    let archived = store.rename(note, &join_path(&folder, note.name())).await?;
    log::info!("[rollover] archived {} to {}", note, archived);
    Ok(archived)
}

/// Move unchecked tasks from the most recent daily note into today's note.
///
/// Missing notes and GitHub failures are logged and skipped. Storage
/// failures while reading or writing are returned as errors; an archive
/// failure after the write is logged and reported as `archived_to: None`.
pub async fn rollover_unchecked_items(
    store: &dyn NoteStore,
    locator: &dyn DailyNoteLocator,
    settings: &RolloverSettings,
    github: Option<&GitHubClient>,
    mode: RolloverMode,
) -> Result<RolloverOutcome, AppError> {
    let Some(today) = locator.today_note().await? else {
        log::info!("[rollover] no daily note for today, nothing to do");
        return Ok(RolloverOutcome::Skipped(SkipReason::NoTodayNote));
    };

    let today_text = store.read(&today).await?;
    if mode == RolloverMode::Automatic && already_populated(&today_text, settings) {
        log::info!("[rollover] {} already has content, skipping", today);
        return Ok(RolloverOutcome::Skipped(SkipReason::AlreadyPopulated));
    }

    let source = locator.most_recent_note().await?;
    let tasks = match &source {
        Some(note) => {
            let text = store.read(note).await?;
            extract_unchecked_items_from_sections(
                &parse_note(&text),
                &settings.skipped_task_extraction_sections,
            )
        }
        None => {
            log::warn!("[rollover] no previous daily note found, skipping task rollover");
            Vec::new()
        }
    };

    let pr_items = match github {
        Some(client) if settings.enable_github_integration => {
            fetch_github_prs(client, settings).await
        }
        _ => GitHubPrItems::default(),
    };

    if tasks.is_empty() && pr_items.is_empty() {
        log::info!("[rollover] nothing to roll over into {}", today);
        return Ok(RolloverOutcome::Skipped(SkipReason::NothingToAdd));
    }

    let mut sections = parse_note(&today_text);
    sections = append_items_to_section(&sections, &tasks, &settings.target_section_heading);
    for (items, heading) in [
        (&pr_items.review_items, &settings.github_section_heading),
        (&pr_items.open_pr_items, &settings.github_open_prs_heading),
        (&pr_items.labeled_items, &settings.github_labeled_prs_heading),
    ] {
        sections = append_items_to_section(&sections, items, heading);
    }

    store
        .modify(&today, &convert_sections_to_content(&sections))
        .await?;
    log::info!(
        "[rollover] moved {} tasks and {} PR items into {}",
        tasks.len(),
        pr_items.review_items.len() + pr_items.open_pr_items.len() + pr_items.labeled_items.len(),
        today
    );

    // today's note is written from here on; archive errors are not returned
    let archived_to = match &source {
        Some(note) if !tasks.is_empty() => {
            match archive_note(store, locator.daily_folder(), settings, note).await {
                Ok(archived) => Some(archived.path().to_string()),
                Err(e) => {
                    log::error!("[rollover] failed to archive {}: {}", note, e);
                    None
                }
            }
        }
        _ => None,
    };

    Ok(RolloverOutcome::Completed(RolloverSummary {
        target: today.path().to_string(),
        source: source.map(|note| note.path().to_string()),
        tasks_moved: tasks.len(),
        review_items: pr_items.review_items.len(),
        open_pr_items: pr_items.open_pr_items.len(),
        labeled_items: pr_items.labeled_items.len(),
        archived_to,
    }))
}
