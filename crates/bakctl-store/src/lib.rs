//! bakctl store
//!
//! Embedded SQLite persistence for backup tasks and their run records.
//!
//! The store owns the schema: two tables (`tasks`, `records`) and four
//! indexes, created idempotently on every open. Task queries live in
//! [`tasks`], record queries in [`records`], and the orphan sweep that keeps
//! records consistent with the archives on disk in [`cleanup`].
//!
//! # Examples
//!
//! ```no_run
//! use bakctl_store::Store;
//! use std::path::Path;
//!
//! fn main() -> bakctl_core::Result<()> {
//!     let store = Store::bootstrap(Path::new("/home/user/.bakctl"), "bakctl.db3")?;
//!     for task in store.all_tasks()? {
//!         println!("{} {}", task.id, task.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cleanup;
pub mod records;
pub mod tasks;

use bakctl_core::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Extensions accepted for the database file.
pub const DB_EXTENSIONS: &[&str] = &["db", "db3", "sqlite"];

/// Maximum number of ids bound into a single IN clause.
pub(crate) const IN_CHUNK: usize = 500;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    retain_count INTEGER DEFAULT 3,
    retain_days INTEGER DEFAULT 7,
    source_dir TEXT NOT NULL,
    storage_dir TEXT NOT NULL,
    compress BOOLEAN DEFAULT FALSE,
    include_rules TEXT,
    exclude_rules TEXT,
    max_file_size INTEGER,
    min_file_size INTEGER,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    task_name TEXT NOT NULL,
    version_id TEXT NOT NULL UNIQUE,
    archive_filename TEXT NOT NULL,
    archive_size INTEGER NOT NULL,
    status BOOLEAN NOT NULL,
    failure_message TEXT,
    checksum TEXT,
    storage_path TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_tasks_name ON tasks(name);
CREATE INDEX IF NOT EXISTS idx_records_created_at ON records(created_at);
CREATE INDEX IF NOT EXISTS idx_records_task_id ON records(task_id);
CREATE INDEX IF NOT EXISTS idx_records_task_name ON records(task_name);
";

/// Handle to the bakctl database.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens (or creates) `dir/filename` and bootstraps the schema.
    pub fn bootstrap(dir: &Path, filename: &str) -> Result<Self> {
        if filename.trim().is_empty() {
            return Err(Error::invalid_config("Database filename must not be empty"));
        }
        Self::open(&dir.join(filename))
    }

    /// Opens (or creates) the database at `path` and bootstraps the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !DB_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Error::invalid_config(format!(
                "Database file {} must have one of the extensions: {}",
                path.display(),
                DB_EXTENSIONS.join(", ")
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        debug!("Opening database {}", path.display());
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.busy_timeout(Duration::from_secs(5))?;
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Path of the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Builds `?,?,...` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Converts a byte count for storage in an INTEGER column.
pub(crate) fn to_db_int(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| Error::invalid_config(format!("Value {} does not fit in the database", value)))
}

/// Reads a non-negative INTEGER column; NULL and negatives become zero.
pub(crate) fn from_db_int(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_creates_file_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/.bakctl");
        let store = Store::bootstrap(&dir, "bakctl.db3").unwrap();
        assert!(dir.join("bakctl.db3").exists());
        assert_eq!(store.path(), Some(dir.join("bakctl.db3").as_path()));
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        Store::bootstrap(tmp.path(), "bakctl.db").unwrap();
        let store = Store::bootstrap(tmp.path(), "bakctl.db").unwrap();
        assert!(store.all_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_bootstrap_rejects_bad_extension() {
        let tmp = TempDir::new().unwrap();
        assert!(Store::bootstrap(tmp.path(), "bakctl.txt").is_err());
        assert!(Store::bootstrap(tmp.path(), "bakctl").is_err());
        assert!(Store::bootstrap(tmp.path(), "").is_err());
    }

    #[test]
    fn test_schema_has_indexes() {
        let store = Store::open_in_memory().unwrap();
        let count: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }
}
