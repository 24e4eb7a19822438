//! Restore a recorded archive into a target directory.

use crate::archive::{self, UnpackOptions};
use crate::hash::{self, HashAlgorithm, DEFAULT_ALGORITHM};
use bakctl_core::{Error, Record, Result};
use bakctl_store::Store;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Which record of a task to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreVersion {
    /// A specific attempt, by version id
    Id(String),
    /// The newest successful attempt
    Latest,
}

/// Options for [`restore`].
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub task_id: i64,
    pub version: RestoreVersion,
    pub target_dir: PathBuf,
    pub progress_enabled: bool,
}

/// Outcome of a restore.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub record: Record,
    pub archive_path: PathBuf,
    pub target_dir: PathBuf,
    /// False when the record carried no checksum to verify against
    pub verified: bool,
    pub file_count: usize,
    pub total_bytes: u64,
    pub duration: Duration,
}

/// Looks up the record a request refers to.
pub fn resolve_record(store: &Store, task_id: i64, version: &RestoreVersion) -> Result<Record> {
    match version {
        RestoreVersion::Id(version_id) => store.record_by_task_and_version(task_id, version_id),
        RestoreVersion::Latest => store.latest_record(task_id),
    }
}

/// Verifies and unpacks the selected archive. Nothing is written to the
/// target when the archive is missing or its checksum does not match.
pub fn restore(store: &Store, request: &RestoreRequest) -> Result<RestoreOutcome> {
    let started = Instant::now();
    let record = resolve_record(store, request.task_id, &request.version)?;
    let archive_path = PathBuf::from(&record.storage_path);

    if !archive_path.is_file() {
        return Err(Error::not_found(
            "Archive file",
            archive_path.display().to_string(),
        ));
    }

    let verified = verify(&archive_path, &record.checksum, request.progress_enabled)?;

    let target_dir = std::path::absolute(&request.target_dir)?;
    debug!(
        archive = %archive_path.display(),
        target = %target_dir.display(),
        "Unpacking archive"
    );

    let stats = archive::unpack(
        &archive_path,
        &target_dir,
        &UnpackOptions {
            overwrite_existing: false,
            progress_enabled: request.progress_enabled,
            disable_path_validation: false,
        },
    )?;

    info!(
        task = %record.task_name,
        version = %record.version_id,
        files = stats.file_count,
        "Restore completed"
    );

    Ok(RestoreOutcome {
        record,
        archive_path,
        target_dir,
        verified,
        file_count: stats.file_count,
        total_bytes: stats.total_bytes,
        duration: started.elapsed(),
    })
}

/// Compares the archive digest with the recorded one. An empty recorded
/// checksum skips verification.
fn verify(archive_path: &Path, expected: &str, progress: bool) -> Result<bool> {
    let expected = expected.trim();
    if expected.is_empty() {
        return Ok(false);
    }

    let algorithm = algorithm_for(expected);
    let actual = if progress {
        hash::checksum_with_progress(archive_path, algorithm)?
    } else {
        hash::checksum(archive_path, algorithm)?
    };

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::Integrity {
            path: archive_path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(true)
}

/// Infers the algorithm from the digest length, falling back to the default.
fn algorithm_for(digest: &str) -> HashAlgorithm {
    [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
    ]
    .into_iter()
    .find(|a| a.hex_len() == digest.len())
    .unwrap_or(DEFAULT_ALGORITHM)
}
