//! Archive file naming.
//!
//! Archives are named `{task_name}_{YYYYMMDD_HHMMSS}.{ext}` in local time.
//! The executor builds names with [`archive_filename`] and the retention engine
//! recognises them with [`ArchiveMatcher`]; both live here so they cannot drift.

use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;

/// Extension produced by the archive adapter (without the dot).
pub const ARCHIVE_EXTENSION: &str = "zip";

/// chrono format of the timestamp embedded in archive names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Builds the archive filename for a task at the given wall-clock time.
pub fn archive_filename(task_name: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        task_name,
        at.format(TIMESTAMP_FORMAT),
        ARCHIVE_EXTENSION
    )
}

/// Matches archive filenames belonging to one task.
#[derive(Debug, Clone)]
pub struct ArchiveMatcher {
    regex: Regex,
}

impl ArchiveMatcher {
    /// Compiles the matcher for `task_name` archives with the given extension.
    pub fn new(task_name: &str, extension: &str) -> Result<Self> {
        let pattern = format!(
            r"^{}_(\d{{8}}_\d{{6}})\.{}$",
            regex::escape(task_name),
            regex::escape(extension.trim_start_matches('.'))
        );
        let regex = Regex::new(&pattern).map_err(|e| Error::invalid_pattern(pattern, e))?;
        Ok(Self { regex })
    }

    /// Matcher for the default archive extension.
    pub fn for_task(task_name: &str) -> Result<Self> {
        Self::new(task_name, ARCHIVE_EXTENSION)
    }

    /// Returns the local timestamp encoded in `filename`, or None when the
    /// name does not belong to this task or the timestamp is not a valid
    /// local time.
    pub fn parse(&self, filename: &str) -> Option<DateTime<Local>> {
        let caps = self.regex.captures(filename)?;
        let naive = NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), TIMESTAMP_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest()
    }

    /// Returns true if `filename` is an archive of this task.
    pub fn is_match(&self, filename: &str) -> bool {
        self.parse(filename).is_some()
    }
}
