//! Note storage and daily-note lookup.
//!
//! The rollover only talks to notes through [`NoteStore`] and
//! [`DailyNoteLocator`], so a host can plug in its own vault API. The
//! filesystem adapters here treat a directory as the vault and address notes
//! by vault-relative, `/`-separated paths.

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

/// Default daily-note file name format.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const NOTE_EXTENSION: &str = "md";

/// A note addressed by its vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteHandle {
    path: String,
}

impl NoteHandle {
    pub fn new(path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self {
            path: path.trim_start_matches('/').to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name including the extension.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Containing folder, `None` at the vault root.
    pub fn parent(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(parent, _)| parent)
    }
}

impl std::fmt::Display for NoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Join vault-relative path segments, skipping empty ones.
pub fn join_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    let name = name.trim_start_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Read and write access to notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn read(&self, note: &NoteHandle) -> Result<String, AppError>;

    /// Replace a note's whole content.
    async fn modify(&self, note: &NoteHandle, content: &str) -> Result<(), AppError>;

    /// Move a note, returning its new handle.
    async fn rename(&self, note: &NoteHandle, new_path: &str) -> Result<NoteHandle, AppError>;

    async fn create_folder(&self, path: &str) -> Result<(), AppError>;

    /// Create a note that does not exist yet.
    async fn create(&self, path: &str, content: &str) -> Result<NoteHandle, AppError>;

    async fn exists(&self, path: &str) -> Result<bool, AppError>;
}

/// Finds today's note and the one before it.
#[async_trait]
pub trait DailyNoteLocator: Send + Sync {
    /// Today's note, if it has been created.
    async fn today_note(&self) -> Result<Option<NoteHandle>, AppError>;

    /// The latest daily note dated before today.
    async fn most_recent_note(&self) -> Result<Option<NoteHandle>, AppError>;

    /// Folder holding daily notes; empty for the vault root.
    fn daily_folder(&self) -> &str;
}

/// [`NoteStore`] over a directory on disk.
#[derive(Debug, Clone)]
pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a vault-relative one. Paths leaving the vault are rejected.
    fn resolve(&self, relative: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::invalid_input_field(
                format!("Path escapes the vault: {}", relative.display()),
                "path",
            ));
        }
        Ok(self.root.join(relative))
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        return AppError::not_found_with_id("Note", path.display().to_string());
    }
    AppError::storage_at(
        format!("Failed to {} {}: {}", action, path.display(), e),
        path.display().to_string(),
    )
}

#[async_trait]
impl NoteStore for FsNoteStore {
    async fn read(&self, note: &NoteHandle) -> Result<String, AppError> {
        let path = self.resolve(note.path())?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| storage_error("read", &path, e))
    }

    async fn modify(&self, note: &NoteHandle, content: &str) -> Result<(), AppError> {
        let path = self.resolve(note.path())?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(AppError::not_found_with_id("Note", note.path()));
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| storage_error("write", &path, e))
    }

    async fn rename(&self, note: &NoteHandle, new_path: &str) -> Result<NoteHandle, AppError> {
        let from = self.resolve(note.path())?;
        let to = self.resolve(new_path)?;
        if tokio::fs::try_exists(&to).await? {
            return Err(AppError::storage_at(
                format!("Destination already exists: {}", new_path),
                to.display().to_string(),
            ));
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| storage_error("move", &from, e))?;
        Ok(NoteHandle::new(new_path))
    }

    async fn create_folder(&self, path: &str) -> Result<(), AppError> {
        let dir = self.resolve(path)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create folder", &dir, e))
    }

    async fn create(&self, path: &str, content: &str) -> Result<NoteHandle, AppError> {
        let file = self.resolve(path)?;
        if tokio::fs::try_exists(&file).await? {
            return Err(AppError::storage_at(
                format!("Note already exists: {}", path),
                file.display().to_string(),
            ));
        }
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create folder", parent, e))?;
        }
        tokio::fs::write(&file, content)
            .await
            .map_err(|e| storage_error("write", &file, e))?;
        Ok(NoteHandle::new(path))
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        let path = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// Where daily notes live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyNoteConfig {
    /// Vault-relative folder; empty for the vault root.
    pub folder: String,
    /// `chrono` format string for the file stem.
    pub format: String,
}

impl Default for DailyNoteConfig {
    fn default() -> Self {
        Self {
            folder: String::new(),
            format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// [`DailyNoteLocator`] over a directory of date-named notes.
#[derive(Debug, Clone)]
pub struct FsDailyNoteLocator {
    store: FsNoteStore,
    config: DailyNoteConfig,
    today: Option<NaiveDate>,
}

impl FsDailyNoteLocator {
    pub fn new(store: FsNoteStore, config: DailyNoteConfig) -> Self {
        Self {
            store,
            config,
            today: None,
        }
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// File name of the daily note for `date`.
    pub fn note_name(&self, date: NaiveDate) -> Result<String, AppError> {
        let mut stem = String::new();
        write!(stem, "{}", date.format(&self.config.format)).map_err(|_| {
            AppError::config(format!("Invalid daily note format: {}", self.config.format))
        })?;
        Ok(format!("{}.{}", stem, NOTE_EXTENSION))
    }

    /// Vault-relative path of the daily note for `date`.
    pub fn note_path(&self, date: NaiveDate) -> Result<String, AppError> {
        Ok(join_path(&self.config.folder, &self.note_name(date)?))
    }

    /// Date encoded in a daily note's file name.
    pub fn parse_date(&self, file_name: &str) -> Option<NaiveDate> {
        let stem = file_name.strip_suffix(&format!(".{}", NOTE_EXTENSION))?;
        NaiveDate::parse_from_str(stem, &self.config.format).ok()
    }

    /// Whether `path` is today's or yesterday's daily note.
    pub fn is_daily_note(&self, path: &str) -> bool {
        let today = self.today();
        [today, today - Duration::days(1)]
            .into_iter()
            .filter_map(|date| self.note_path(date).ok())
            .any(|candidate| candidate == path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DailyNoteLocator for FsDailyNoteLocator {
    async fn today_note(&self) -> Result<Option<NoteHandle>, AppError> {
        let path = self.note_path(self.today())?;
        if self.store.exists(&path).await? {
            Ok(Some(NoteHandle::new(path)))
        } else {
            Ok(None)
        }
    }

    async fn most_recent_note(&self) -> Result<Option<NoteHandle>, AppError> {
        let dir = self.store.resolve(&self.config.folder)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("list", &dir, e)),
        };

        let today = self.today();
        let mut latest: Option<(NaiveDate, String)> = None;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(date) = self.parse_date(&name) else {
                continue;
            };
            if date < today && latest.as_ref().map_or(true, |(best, _)| date > *best) {
                latest = Some((date, name));
            }
        }

        Ok(latest.map(|(_, name)| NoteHandle::new(join_path(&self.config.folder, &name))))
    }

    fn daily_folder(&self) -> &str {
        &self.config.folder
    }
}
