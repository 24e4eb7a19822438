//! Archive retention.
//!
//! Prunes a task's archives from its storage directory. The store is not
//! consulted: archives are discovered by name through the shared
//! [`ArchiveMatcher`] and dated by the timestamp embedded in the name.
//!
//! # Policy
//!
//! With `C = retain_count` and `D = retain_days`, files sorted newest first:
//!
//! 1. `C = 0, D = 0`: keep everything
//! 2. `C > 0, D = 0`: keep the `C` newest
//! 3. `C = 0, D > 0`: delete files at or before `now - D days`
//! 4. `C > 0, D > 0`: apply the age cutoff, then keep the `C` newest of each
//!    calendar day
//!
//! If an active policy would delete every file, the newest one is kept.

use bakctl_core::{ArchiveMatcher, Result};
use chrono::{DateTime, Duration, Local, NaiveDate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Count and age limits of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    pub retain_count: u32,
    pub retain_days: u32,
}

impl RetentionPolicy {
    /// True when at least one dimension is active.
    pub fn is_active(&self) -> bool {
        self.retain_count > 0 || self.retain_days > 0
    }
}

/// A file that failed to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionError {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Archives of the task found in the directory
    pub total_files: usize,
    /// Archives removed
    pub deleted_files: usize,
    /// Archives that could not be removed
    pub error_files: Vec<RetentionError>,
}

/// What to sweep.
#[derive(Debug, Clone)]
pub struct RetentionRequest<'a> {
    pub storage_dir: &'a Path,
    pub task_name: &'a str,
    pub extension: &'a str,
    pub policy: RetentionPolicy,
    /// File name that must survive regardless of policy
    pub protect: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct ArchiveFile {
    path: PathBuf,
    name: String,
    timestamp: DateTime<Local>,
}

/// Runs the sweep against the current wall clock.
pub fn sweep(request: &RetentionRequest<'_>) -> Result<RetentionReport> {
    sweep_at(request, Local::now())
}

/// Runs the sweep as if the current time were `now`.
pub fn sweep_at(request: &RetentionRequest<'_>, now: DateTime<Local>) -> Result<RetentionReport> {
    let matcher = ArchiveMatcher::new(request.task_name, request.extension)?;
    let mut files = discover(request.storage_dir, &matcher);
    let mut report = RetentionReport {
        total_files: files.len(),
        ..Default::default()
    };

    if files.is_empty() || !request.policy.is_active() {
        return Ok(report);
    }

    files.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.name.cmp(&a.name))
    });

    let doomed = select_deletions(&files, request.policy, now, request.protect);
    for idx in doomed {
        let file = &files[idx];
        match std::fs::remove_file(&file.path) {
            Ok(()) => {
                debug!("Deleted expired archive {}", file.path.display());
                report.deleted_files += 1;
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", file.path.display(), e);
                report.error_files.push(RetentionError {
                    path: file.path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    if report.deleted_files > 0 || !report.error_files.is_empty() {
        info!(
            task = request.task_name,
            total = report.total_files,
            deleted = report.deleted_files,
            errors = report.error_files.len(),
            "Retention sweep finished"
        );
    }
    Ok(report)
}

/// Lists the task's archives. Unreadable entries, non-files and names that
/// do not parse are skipped; a missing directory yields nothing.
fn discover(dir: &Path, matcher: &ArchiveMatcher) -> Vec<ArchiveFile> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Storage directory {} not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let timestamp = matcher.parse(&name)?;
            Some(ArchiveFile {
                path: entry.path(),
                name,
                timestamp,
            })
        })
        .collect()
}

/// Indices (into `files`, sorted newest first) that fall outside the policy.
fn select_deletions(
    files: &[ArchiveFile],
    policy: RetentionPolicy,
    now: DateTime<Local>,
    protect: Option<&str>,
) -> Vec<usize> {
    let count = policy.retain_count as usize;
    let cutoff = now - Duration::days(i64::from(policy.retain_days));

    let mut doomed: Vec<usize> = match (policy.retain_count > 0, policy.retain_days > 0) {
        (false, false) => Vec::new(),
        (true, false) => (count.min(files.len())..files.len()).collect(),
        (false, true) => (0..files.len())
            .filter(|&i| files[i].timestamp <= cutoff)
            .collect(),
        (true, true) => {
            let mut doomed = Vec::new();
            let mut kept_per_day: HashMap<NaiveDate, usize> = HashMap::new();
            for (i, file) in files.iter().enumerate() {
                if file.timestamp <= cutoff {
                    doomed.push(i);
                    continue;
                }
                let kept = kept_per_day.entry(file.timestamp.date_naive()).or_insert(0);
                if *kept < count {
                    *kept += 1;
                } else {
                    doomed.push(i);
                }
            }
            doomed
        }
    };

    // Never delete the last surviving archive.
    if !doomed.is_empty() && doomed.len() == files.len() {
        doomed.retain(|&i| i != 0);
    }

    if let Some(protected) = protect {
        doomed.retain(|&i| files[i].name != protected);
    }

    doomed
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakctl_core::{archive_filename, ARCHIVE_EXTENSION};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn touch(dir: &Path, name: &str, at: DateTime<Local>) -> String {
        let file = archive_filename(name, at);
        std::fs::write(dir.join(&file), b"zip").unwrap();
        file
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn request<'a>(dir: &'a Path, count: u32, days: u32) -> RetentionRequest<'a> {
        RetentionRequest {
            storage_dir: dir,
            task_name: "docs",
            extension: ARCHIVE_EXTENSION,
            policy: RetentionPolicy {
                retain_count: count,
                retain_days: days,
            },
            protect: None,
        }
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let report = sweep(&request(&tmp.path().join("missing"), 3, 7)).unwrap();
        assert_eq!(report, RetentionReport::default());
    }

    #[test]
    fn test_inactive_policy_keeps_everything() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        for d in 1..=5 {
            touch(tmp.path(), "docs", now - Duration::days(d * 30));
        }
        let report = sweep_at(&request(tmp.path(), 0, 0), now).unwrap();
        assert_eq!(report.total_files, 5);
        assert_eq!(report.deleted_files, 0);
        assert_eq!(remaining(tmp.path()).len(), 5);
    }

    #[test]
    fn test_count_only_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        let mut names = Vec::new();
        for d in 1..=8 {
            names.push(touch(tmp.path(), "docs", now - Duration::days(d)));
        }

        let report = sweep_at(&request(tmp.path(), 3, 0), now).unwrap();
        assert_eq!(report.total_files, 8);
        assert_eq!(report.deleted_files, 5);

        let mut expected = names[..3].to_vec();
        expected.sort();
        assert_eq!(remaining(tmp.path()), expected);
    }

    #[test]
    fn test_age_only_cutoff_is_inclusive() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        let fresh = touch(tmp.path(), "docs", now - Duration::days(2));
        touch(tmp.path(), "docs", now - Duration::days(7));
        touch(tmp.path(), "docs", now - Duration::days(9));

        let report = sweep_at(&request(tmp.path(), 0, 7), now).unwrap();
        assert_eq!(report.deleted_files, 2);
        assert_eq!(remaining(tmp.path()), vec![fresh]);
    }

    #[test]
    fn test_combined_policy_keeps_per_day() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        let mut newest_per_day = Vec::new();
        for day in 0..3 {
            let base = now - Duration::days(day);
            newest_per_day.push(touch(tmp.path(), "docs", base - Duration::hours(1)));
            touch(tmp.path(), "docs", base - Duration::hours(2));
        }
        for i in 0..5 {
            touch(
                tmp.path(),
                "docs",
                now - Duration::days(8) - Duration::minutes(i),
            );
        }

        let report = sweep_at(&request(tmp.path(), 1, 7), now).unwrap();
        assert_eq!(report.total_files, 11);
        assert_eq!(report.deleted_files, 8);

        newest_per_day.sort();
        assert_eq!(remaining(tmp.path()), newest_per_day);
    }

    #[test]
    fn test_fail_safe_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        let newest = touch(tmp.path(), "docs", now - Duration::days(30));
        touch(tmp.path(), "docs", now - Duration::days(40));
        touch(tmp.path(), "docs", now - Duration::days(50));

        let report = sweep_at(&request(tmp.path(), 0, 7), now).unwrap();
        assert_eq!(report.deleted_files, 2);
        assert_eq!(remaining(tmp.path()), vec![newest]);

        // Combined policy, everything outside the window.
        let report = sweep_at(&request(tmp.path(), 2, 7), now).unwrap();
        assert_eq!(report.deleted_files, 0);
        assert_eq!(remaining(tmp.path()).len(), 1);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        for d in 0..6 {
            touch(tmp.path(), "docs", now - Duration::days(d) - Duration::hours(1));
        }
        sweep_at(&request(tmp.path(), 2, 3), now).unwrap();
        let after_first = remaining(tmp.path());
        let second = sweep_at(&request(tmp.path(), 2, 3), now).unwrap();
        assert_eq!(second.deleted_files, 0);
        assert_eq!(remaining(tmp.path()), after_first);
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        touch(tmp.path(), "docs", now - Duration::days(20));
        touch(tmp.path(), "other", now - Duration::days(20));
        std::fs::write(tmp.path().join("docs_notes.zip"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("docs_20250101_000000.zip")).unwrap();

        let report = sweep_at(&request(tmp.path(), 1, 0), now).unwrap();
        assert_eq!(report.total_files, 1);
        assert_eq!(report.deleted_files, 0);
        assert_eq!(remaining(tmp.path()).len(), 4);
    }

    #[test]
    fn test_protected_file_survives() {
        let tmp = TempDir::new().unwrap();
        let now = noon(2025, 6, 10);
        let older = touch(tmp.path(), "docs", now - Duration::days(3));
        touch(tmp.path(), "docs", now - Duration::days(1));

        let mut req = request(tmp.path(), 1, 0);
        req.protect = Some(&older);
        let report = sweep_at(&req, now).unwrap();
        assert_eq!(report.deleted_files, 0);
        assert_eq!(remaining(tmp.path()).len(), 2);
    }
}
