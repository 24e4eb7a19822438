//! End-to-end backup scenarios
//!
//! Each test works against a real SQLite file and real archives inside a
//! temporary directory.

use bakctl_backup::retention::sweep_at;
use bakctl_backup::{
    restore, unpack, BackupExecutor, RestoreRequest, RestoreVersion, RetentionPolicy,
    RetentionRequest, UnpackOptions,
};
use bakctl_core::{archive_filename, Error, Task, TaskConfig, ARCHIVE_EXTENSION};
use bakctl_store::Store;
use chrono::{DateTime, Duration, Local, TimeZone};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    tmp: TempDir,
    store: Store,
}

impl Fixture {
    /// Source tree with `a.txt` (10 bytes) and `b.log` (20 bytes).
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.txt"), b"0123456789").unwrap();
        std::fs::write(src.join("b.log"), [b'l'; 20]).unwrap();
        let store = Store::bootstrap(tmp.path(), "bakctl.db3").unwrap();
        Self { tmp, store }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    fn add_task(&self, configure: impl FnOnce(&mut TaskConfig)) -> Task {
        let mut config = TaskConfig {
            name: "docs".to_string(),
            source_dir: self.path("src").to_string_lossy().into_owned(),
            storage_dir: self.path("out").to_string_lossy().into_owned(),
            ..Default::default()
        };
        configure(&mut config);
        let new_task = config.resolve(&self.path("default")).unwrap();
        let id = self.store.insert_task(&new_task).unwrap();
        self.store.task_by_id(id).unwrap()
    }
}

fn noon(days_ago: i64) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap() - Duration::days(days_ago)
}

fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_malformed_stored_rules_record_one_failure() {
    let fx = Fixture::new();
    let task = fx.add_task(|_| {});
    let conn = rusqlite::Connection::open(fx.path("bakctl.db3")).unwrap();
    conn.execute(
        "UPDATE tasks SET include_rules = '[bad' WHERE id = ?1",
        [task.id],
    )
    .unwrap();

    let task = fx.store.task_by_id(task.id).unwrap();
    assert_eq!(fx.store.all_tasks().unwrap().len(), 1);

    let err = BackupExecutor::new(&fx.store).run(&task).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));

    let records = fx.store.records_by_task(task.id, None).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].status);
    assert!(records[0].failure_message.contains("include rules"));
    assert!(records[0].checksum.is_empty());
    assert!(!fx.path("out/src").exists() || names_in(&fx.path("out/src")).is_empty());
}

#[test]
fn test_add_run_round_trip() {
    let fx = Fixture::new();
    let task = fx.add_task(|_| {});
    assert_eq!(Path::new(&task.storage_dir), fx.path("out/src"));

    let report = BackupExecutor::new(&fx.store).run(&task).unwrap();
    assert_eq!(report.archive_path.parent().unwrap(), fx.path("out/src"));

    let archives = names_in(&fx.path("out/src"));
    assert_eq!(archives.len(), 1);
    assert!(archives[0].starts_with("docs_"));
    assert!(archives[0].ends_with(".zip"));

    let records = fx.store.records_by_task(task.id, None).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].status);
    assert!(records[0].archive_size > 0);
    assert!(!records[0].checksum.is_empty());
    assert_eq!(records[0].archive_filename, archives[0]);
}

#[test]
fn test_exclude_rules_filter_archive() {
    let fx = Fixture::new();
    let task = fx.add_task(|c| c.exclude_rules = vec!["*.log".to_string()]);

    let report = BackupExecutor::new(&fx.store).run(&task).unwrap();
    let unpacked = fx.path("unpacked");
    unpack(&report.archive_path, &unpacked, &UnpackOptions::default()).unwrap();

    assert_eq!(names_in(&unpacked), vec!["a.txt".to_string()]);
}

#[test]
fn test_retention_count_only() {
    let fx = Fixture::new();
    let dir = fx.path("out/src");
    std::fs::create_dir_all(&dir).unwrap();
    let mut created = Vec::new();
    for day in 1..=8 {
        let name = archive_filename("docs", noon(day));
        std::fs::write(dir.join(&name), b"zip").unwrap();
        created.push(name);
    }

    let report = sweep_at(
        &RetentionRequest {
            storage_dir: &dir,
            task_name: "docs",
            extension: ARCHIVE_EXTENSION,
            policy: RetentionPolicy {
                retain_count: 3,
                retain_days: 0,
            },
            protect: None,
        },
        noon(0),
    )
    .unwrap();

    assert_eq!(report.total_files, 8);
    assert_eq!(report.deleted_files, 5);
    let mut newest = created[..3].to_vec();
    newest.sort();
    assert_eq!(names_in(&dir), newest);
}

#[test]
fn test_retention_combined_policy() {
    let fx = Fixture::new();
    let dir = fx.path("out/src");
    std::fs::create_dir_all(&dir).unwrap();

    let mut offsets = Vec::new();
    for day in 0..3 {
        offsets.push(Duration::days(day) + Duration::hours(1));
        offsets.push(Duration::days(day) + Duration::hours(2));
    }
    for minute in 0..5 {
        offsets.push(Duration::days(8) + Duration::minutes(minute));
    }
    for offset in &offsets {
        let name = archive_filename("docs", noon(0) - *offset);
        std::fs::write(dir.join(name), b"zip").unwrap();
    }

    let report = sweep_at(
        &RetentionRequest {
            storage_dir: &dir,
            task_name: "docs",
            extension: ARCHIVE_EXTENSION,
            policy: RetentionPolicy {
                retain_count: 1,
                retain_days: 7,
            },
            protect: None,
        },
        noon(0),
    )
    .unwrap();

    assert_eq!(report.total_files, 11);
    assert_eq!(report.deleted_files, 8);
    let expected: Vec<String> = (0..3)
        .map(|day| archive_filename("docs", noon(day) - Duration::hours(1)))
        .rev()
        .collect();
    assert_eq!(names_in(&dir), expected);
}

#[test]
fn test_missing_source_records_failure() {
    let fx = Fixture::new();
    let task = fx.add_task(|_| {});
    std::fs::remove_dir_all(fx.path("src")).unwrap();

    assert!(BackupExecutor::new(&fx.store).run(&task).is_err());

    assert!(!fx.path("out/src").exists() || names_in(&fx.path("out/src")).is_empty());
    let records = fx.store.records_by_task(task.id, None).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].status);
    assert!(!records[0].failure_message.is_empty());
    assert_eq!(records[0].checksum, "");
}

#[test]
fn test_restore_rejects_corrupt_archive() {
    let fx = Fixture::new();
    let task = fx.add_task(|_| {});
    let report = BackupExecutor::new(&fx.store).run(&task).unwrap();

    let mut bytes = std::fs::read(&report.archive_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    std::fs::write(&report.archive_path, bytes).unwrap();

    let target = fx.path("restore-target");
    std::fs::create_dir_all(&target).unwrap();
    let err = restore(
        &fx.store,
        &RestoreRequest {
            task_id: task.id,
            version: RestoreVersion::Id(report.version_id),
            target_dir: target.clone(),
            progress_enabled: false,
        },
    )
    .unwrap_err();

    assert!(matches!(err, Error::Integrity { .. }));
    assert!(names_in(&target).is_empty());
}

#[test]
fn test_orphan_cleanup_keeps_failures() {
    let fx = Fixture::new();
    let task = fx.add_task(|_| {});
    let executor = BackupExecutor::new(&fx.store);
    let report = executor.run(&task).unwrap();

    std::fs::remove_dir_all(fx.path("src")).unwrap();
    assert!(executor.run(&task).is_err());

    std::fs::remove_file(&report.archive_path).unwrap();
    assert_eq!(fx.store.cleanup_orphans(None).unwrap(), 1);

    let remaining = fx.store.records_by_task(task.id, None).unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(!remaining[0].status);
}

#[test]
fn test_successful_record_matches_archive() {
    let fx = Fixture::new();
    let task = fx.add_task(|c| c.compress = true);
    BackupExecutor::new(&fx.store).run(&task).unwrap();

    for record in fx.store.records_by_task(task.id, None).unwrap() {
        let meta = std::fs::metadata(&record.storage_path).unwrap();
        assert_eq!(record.status, meta.is_file());
        assert_eq!(meta.len(), record.archive_size);
    }
}

proptest! {
    #[test]
    fn prop_executor_names_are_found_by_retention(
        name in "[a-zA-Z][a-zA-Z0-9_.-]{0,24}",
        days in 0i64..400,
    ) {
        let tmp = TempDir::new().unwrap();
        let file = archive_filename(&name, noon(days));
        std::fs::write(tmp.path().join(&file), b"zip").unwrap();

        let report = sweep_at(
            &RetentionRequest {
                storage_dir: tmp.path(),
                task_name: &name,
                extension: ARCHIVE_EXTENSION,
                policy: RetentionPolicy { retain_count: 1, retain_days: 1 },
                protect: None,
            },
            noon(0),
        )
        .unwrap();

        prop_assert_eq!(report.total_files, 1);
        prop_assert_eq!(report.deleted_files, 0);
        prop_assert!(tmp.path().join(&file).exists());
    }
}
