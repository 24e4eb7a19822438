//! Task and record models.

use crate::error::{Error, Result};
use crate::rules::RuleList;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of archives kept per day.
pub const DEFAULT_RETAIN_COUNT: u32 = 3;

/// Default age window in days.
pub const DEFAULT_RETAIN_DAYS: u32 = 7;

/// Characters rejected in task names and source paths.
pub const INVALID_CHARS: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '+', '=', '{', '}', '[', ']', '|', ';',
    '\'', '"', '<', '>', ',', '?', '~', '`',
];

/// Format used by SQLite's CURRENT_TIMESTAMP.
const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A persisted backup task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub retain_count: u32,
    pub retain_days: u32,
    pub source_dir: String,
    /// Effective storage directory: user storage dir joined with the source basename
    pub storage_dir: String,
    pub compress: bool,
    /// Decoded when a backup runs
    pub include_rules: RuleList,
    pub exclude_rules: RuleList,
    pub max_file_size: u64,
    pub min_file_size: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// The storage directory the user originally supplied (parent of `storage_dir`).
    pub fn user_storage_dir(&self) -> PathBuf {
        let stored = Path::new(&self.storage_dir);
        stored
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| stored.to_path_buf())
    }

    /// Decoded include rules.
    pub fn include(&self) -> Result<Vec<String>> {
        self.decode_rules("include", &self.include_rules)
    }

    /// Decoded exclude rules.
    pub fn exclude(&self) -> Result<Vec<String>> {
        self.decode_rules("exclude", &self.exclude_rules)
    }

    fn decode_rules(&self, kind: &str, rules: &RuleList) -> Result<Vec<String>> {
        rules.decode().map_err(|e| {
            Error::invalid_config(format!(
                "Task '{}' has malformed {} rules {}: {}",
                self.name,
                kind,
                rules.as_stored(),
                e
            ))
        })
    }
}

/// One execution attempt of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub version_id: String,
    pub archive_filename: String,
    pub archive_size: u64,
    pub storage_path: String,
    pub status: bool,
    pub failure_message: String,
    pub checksum: String,
    /// UTC, as written by the database default
    pub created_at: String,
}

impl Record {
    /// `created_at` converted to local time for display.
    pub fn created_at_local(&self) -> String {
        utc_to_local(&self.created_at)
    }
}

/// Record values written by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub task_id: i64,
    pub task_name: String,
    pub version_id: String,
    pub archive_filename: String,
    pub archive_size: u64,
    pub storage_path: String,
    pub status: bool,
    pub failure_message: String,
    pub checksum: String,
}

/// User input for a new task, before validation and storage-dir derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub name: String,
    pub source_dir: String,
    /// Empty means the default storage root
    pub storage_dir: String,
    pub retain_count: u32,
    pub retain_days: u32,
    pub compress: bool,
    pub include_rules: Vec<String>,
    pub exclude_rules: Vec<String>,
    pub max_file_size: u64,
    pub min_file_size: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            source_dir: String::new(),
            storage_dir: String::new(),
            retain_count: DEFAULT_RETAIN_COUNT,
            retain_days: DEFAULT_RETAIN_DAYS,
            compress: false,
            include_rules: Vec::new(),
            exclude_rules: Vec::new(),
            max_file_size: 0,
            min_file_size: 0,
        }
    }
}

/// A validated task ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub source_dir: String,
    pub storage_dir: String,
    pub retain_count: u32,
    pub retain_days: u32,
    pub compress: bool,
    pub include_rules: Vec<String>,
    pub exclude_rules: Vec<String>,
    pub max_file_size: u64,
    pub min_file_size: u64,
}

impl TaskConfig {
    /// Checks name, paths and size bounds without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_path("Source directory", &self.source_dir)?;
        if !self.storage_dir.trim().is_empty() {
            validate_path("Storage directory", &self.storage_dir)?;
        }
        validate_size_bounds(self.min_file_size, self.max_file_size)
    }

    /// Validates the config against the filesystem and derives the effective
    /// storage directory (`storage_root / basename(source_dir)`).
    ///
    /// `default_storage` is used when the config leaves the storage dir empty.
    pub fn resolve(&self, default_storage: &Path) -> Result<NewTask> {
        self.validate()?;

        let source = std::path::absolute(self.source_dir.trim())?;
        if !source.is_dir() {
            return Err(Error::not_found(
                "Source directory",
                source.display().to_string(),
            ));
        }

        let storage_root = if self.storage_dir.trim().is_empty() {
            default_storage.to_path_buf()
        } else {
            std::path::absolute(self.storage_dir.trim())?
        };

        let basename = source.file_name().ok_or_else(|| {
            Error::invalid_config(format!(
                "Source directory has no final component: {}",
                source.display()
            ))
        })?;
        let storage = storage_root.join(basename);

        if storage.starts_with(&source) {
            return Err(Error::invalid_config(format!(
                "Storage directory {} must not be inside the source directory {}",
                storage.display(),
                source.display()
            )));
        }

        Ok(NewTask {
            name: self.name.trim().to_string(),
            source_dir: source.to_string_lossy().into_owned(),
            storage_dir: storage.to_string_lossy().into_owned(),
            retain_count: self.retain_count,
            retain_days: self.retain_days,
            compress: self.compress,
            include_rules: self.include_rules.clone(),
            exclude_rules: self.exclude_rules.clone(),
            max_file_size: self.max_file_size,
            min_file_size: self.min_file_size,
        })
    }
}

/// Changed fields for an existing task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub retain_count: Option<u32>,
    pub retain_days: Option<u32>,
    pub compress: Option<bool>,
    pub include_rules: Option<Vec<String>>,
    pub exclude_rules: Option<Vec<String>>,
    pub max_file_size: Option<u64>,
    pub min_file_size: Option<u64>,
}

impl TaskUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the changes to a copy of `task` and validates the result.
    pub fn apply_to(&self, task: &Task) -> Result<Task> {
        let mut updated = task.clone();
        if let Some(v) = self.retain_count {
            updated.retain_count = v;
        }
        if let Some(v) = self.retain_days {
            updated.retain_days = v;
        }
        if let Some(v) = self.compress {
            updated.compress = v;
        }
        if let Some(v) = &self.include_rules {
            updated.include_rules = RuleList::from(v.clone());
        }
        if let Some(v) = &self.exclude_rules {
            updated.exclude_rules = RuleList::from(v.clone());
        }
        if let Some(v) = self.max_file_size {
            updated.max_file_size = v;
        }
        if let Some(v) = self.min_file_size {
            updated.min_file_size = v;
        }
        validate_size_bounds(updated.min_file_size, updated.max_file_size)?;
        Ok(updated)
    }
}

/// Task names must be non-blank and free of shell-special characters and
/// path separators.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_config("Task name must not be empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| INVALID_CHARS.contains(c) || *c == '/' || *c == '\\')
    {
        return Err(Error::invalid_config(format!(
            "Task name must not contain '{}'",
            c
        )));
    }
    Ok(())
}

/// Paths must be non-blank and free of shell-special characters; `/` and `\`
/// are allowed.
pub fn validate_path(label: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::invalid_config(format!("{} must not be empty", label)));
    }
    if let Some(c) = path.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(Error::invalid_config(format!(
            "{} must not contain '{}'",
            label, c
        )));
    }
    Ok(())
}

fn validate_size_bounds(min: u64, max: u64) -> Result<()> {
    if min > 0 && max > 0 && min > max {
        return Err(Error::invalid_config(format!(
            "Minimum file size ({}) is larger than maximum file size ({})",
            min, max
        )));
    }
    Ok(())
}

/// Converts a `YYYY-MM-DD HH:MM:SS` UTC timestamp to local time. Unparseable
/// input is returned unchanged.
pub fn utc_to_local(ts: &str) -> String {
    match NaiveDateTime::parse_from_str(ts, DB_TIMESTAMP_FORMAT) {
        Ok(naive) => Utc
            .from_utc_datetime(&naive)
            .with_timezone(&Local)
            .format(DB_TIMESTAMP_FORMAT)
            .to_string(),
        Err(_) => ts.to_string(),
    }
}
