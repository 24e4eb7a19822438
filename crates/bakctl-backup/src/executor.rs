//! Backup execution.
//!
//! One call to [`BackupExecutor::run`] is one attempt: at most one archive is
//! left on disk and exactly one record is written, whatever step fails. The
//! record is held by a guard that inserts it on commit or, if the attempt
//! unwinds before committing, when dropped.

use crate::archive::{self, CompressionLevel, PackOptions};
use crate::filters::FilterOptions;
use crate::hash::{self, DEFAULT_ALGORITHM};
use crate::retention::{self, RetentionPolicy, RetentionReport, RetentionRequest};
use bakctl_core::{archive_filename, Error, NewRecord, Result, Task, ARCHIVE_EXTENSION};
use bakctl_store::Store;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// State of one attempt, turned into a record when the attempt ends.
#[derive(Debug, Clone, Default)]
struct RunState {
    task_id: i64,
    task_name: String,
    version_id: String,
    archive_path: PathBuf,
    archive_filename: String,
    success: bool,
    error_message: String,
    file_size: u64,
    checksum: String,
}

impl RunState {
    fn to_record(&self) -> NewRecord {
        NewRecord {
            task_id: self.task_id,
            task_name: self.task_name.clone(),
            version_id: self.version_id.clone(),
            archive_filename: self.archive_filename.clone(),
            archive_size: self.file_size,
            storage_path: self.archive_path.to_string_lossy().into_owned(),
            status: self.success,
            failure_message: self.error_message.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

struct RecordGuard<'a> {
    store: &'a Store,
    state: RunState,
    committed: bool,
}

impl<'a> RecordGuard<'a> {
    fn new(store: &'a Store, state: RunState) -> Self {
        Self {
            store,
            state,
            committed: false,
        }
    }

    fn commit(mut self) -> (Result<i64>, RunState) {
        self.committed = true;
        let inserted = self.store.insert_record(&self.state.to_record());
        (inserted, std::mem::take(&mut self.state))
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.state.error_message.is_empty() {
            self.state.success = false;
            self.state.error_message = "Backup interrupted before completion".to_string();
        }
        if let Err(e) = self.store.insert_record(&self.state.to_record()) {
            warn!(
                "Failed to record interrupted backup of '{}': {}",
                self.state.task_name, e
            );
        }
    }
}

/// A successful attempt.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub record_id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub version_id: String,
    pub archive_path: PathBuf,
    pub archive_size: u64,
    pub checksum: String,
    pub file_count: usize,
    pub duration: Duration,
    /// `None` when the sweep itself failed
    pub retention: Option<RetentionReport>,
}

/// Outcome of one task inside a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub task_id: i64,
    pub task_name: String,
    pub result: Result<RunReport>,
}

/// Aggregate of [`BackupExecutor::run_batch`].
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}

/// Runs backup tasks against a store.
pub struct BackupExecutor<'a> {
    store: &'a Store,
    progress: bool,
}

impl<'a> BackupExecutor<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            progress: false,
        }
    }

    /// Draws pack and hash progress bars on the terminal.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Runs one attempt of `task`.
    ///
    /// A record is written whether or not the attempt succeeds. On failure
    /// the returned error carries the same message as the record.
    pub fn run(&self, task: &Task) -> Result<RunReport> {
        let started = Instant::now();
        let filename = archive_filename(&task.name, Local::now());
        let archive_path = Path::new(&task.storage_dir).join(&filename);

        let mut guard = RecordGuard::new(
            self.store,
            RunState {
                task_id: task.id,
                task_name: task.name.clone(),
                version_id: Uuid::new_v4().simple().to_string(),
                archive_path,
                archive_filename: filename,
                ..Default::default()
            },
        );

        debug!(
            task = %task.name,
            archive = %guard.state.archive_path.display(),
            "Starting backup"
        );

        let outcome = self.execute(task, &mut guard.state);
        if let Err(e) = &outcome {
            guard.state.success = false;
            guard.state.error_message = e.to_string();
        }

        let (inserted, state) = guard.commit();
        let record_id = inserted?;
        let file_count = outcome?;

        info!(
            task = %state.task_name,
            size = state.file_size,
            files = file_count,
            "Backup completed"
        );

        let retention = self.apply_retention(task, &state.archive_filename);

        Ok(RunReport {
            record_id,
            task_id: state.task_id,
            task_name: state.task_name,
            version_id: state.version_id,
            archive_path: state.archive_path,
            archive_size: state.file_size,
            checksum: state.checksum,
            file_count,
            duration: started.elapsed(),
            retention,
        })
    }

    /// Runs every task in order, one after another.
    pub fn run_batch(&self, tasks: &[Task]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for task in tasks {
            let result = self.run(task);
            match &result {
                Ok(_) => summary.success_count += 1,
                Err(e) => {
                    warn!("Backup of '{}' failed: {}", task.name, e);
                    summary.failure_count += 1;
                }
            }
            summary.items.push(BatchItem {
                task_id: task.id,
                task_name: task.name.clone(),
                result,
            });
        }
        summary
    }

    /// Validates, packs and hashes. Returns the number of archived files.
    fn execute(&self, task: &Task, state: &mut RunState) -> Result<usize> {
        let source = Path::new(&task.source_dir);
        if !source.is_dir() {
            return Err(Error::not_found(
                "Source directory",
                source.display().to_string(),
            ));
        }

        let include = task.include()?;
        let exclude = task.exclude()?;

        let options = PackOptions {
            compression_level: CompressionLevel::from_compress(task.compress),
            overwrite_existing: false,
            filter: FilterOptions {
                include,
                exclude,
                min_size: task.min_file_size,
                max_size: task.max_file_size,
            },
            progress_enabled: self.progress,
        };
        let stats = archive::pack(&state.archive_path, source, &options)?;

        state.file_size = std::fs::metadata(&state.archive_path)?.len();

        let digest = if self.progress {
            hash::checksum_with_progress(&state.archive_path, DEFAULT_ALGORITHM)
        } else {
            hash::checksum(&state.archive_path, DEFAULT_ALGORITHM)
        };
        match digest {
            Ok(checksum) => state.checksum = checksum,
            Err(e) => {
                // A failed record must not leave its archive behind.
                if let Err(rm) = std::fs::remove_file(&state.archive_path) {
                    warn!(
                        "Failed to remove unverified archive {}: {}",
                        state.archive_path.display(),
                        rm
                    );
                }
                return Err(e);
            }
        }

        state.success = true;
        Ok(stats.file_count)
    }

    fn apply_retention(&self, task: &Task, produced: &str) -> Option<RetentionReport> {
        let request = RetentionRequest {
            storage_dir: Path::new(&task.storage_dir),
            task_name: &task.name,
            extension: ARCHIVE_EXTENSION,
            policy: RetentionPolicy {
                retain_count: task.retain_count,
                retain_days: task.retain_days,
            },
            protect: Some(produced),
        };

        match retention::sweep(&request) {
            Ok(report) => {
                for failed in &report.error_files {
                    warn!(
                        "Retention could not delete {}: {}",
                        failed.path.display(),
                        failed.message
                    );
                }
                Some(report)
            }
            Err(e) => {
                warn!("Retention sweep for '{}' failed: {}", task.name, e);
                None
            }
        }
    }
}
