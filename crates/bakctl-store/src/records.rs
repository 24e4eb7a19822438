//! Backup record queries.

use crate::{from_db_int, placeholders, to_db_int, Store, IN_CHUNK};
use bakctl_core::{Error, NewRecord, Record, Result};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::{debug, info};

const RECORD_COLUMNS: &str = "id, task_id, task_name, version_id, archive_filename, \
     archive_size, storage_path, status, COALESCE(failure_message, ''), \
     COALESCE(checksum, ''), COALESCE(created_at, '')";

/// Newest first; ties inside one second fall back to insertion order.
const NEWEST_FIRST: &str = "ORDER BY created_at DESC, id DESC";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        task_id: row.get(1)?,
        task_name: row.get(2)?,
        version_id: row.get(3)?,
        archive_filename: row.get(4)?,
        archive_size: from_db_int(row.get(5)?),
        storage_path: row.get(6)?,
        status: row.get(7)?,
        failure_message: row.get(8)?,
        checksum: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
    match limit {
        Some(n) if n > 0 => i64::try_from(n).unwrap_or(i64::MAX),
        _ => -1,
    }
}

impl Store {
    /// Appends one record. A version id collision is reported as
    /// `AlreadyExists` and must be treated as fatal by the caller.
    pub fn insert_record(&self, record: &NewRecord) -> Result<i64> {
        let result = self.conn().execute(
            "INSERT INTO records (task_id, task_name, version_id, archive_filename, \
             archive_size, status, failure_message, checksum, storage_path) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.task_id,
                record.task_name,
                record.version_id,
                record.archive_filename,
                to_db_int(record.archive_size)?,
                record.status,
                record.failure_message,
                record.checksum,
                record.storage_path,
            ],
        );

        match result {
            Ok(_) => {
                let id = self.conn().last_insert_rowid();
                debug!(
                    record_id = id,
                    task_id = record.task_id,
                    status = record.status,
                    "Record inserted"
                );
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::already_exists("Record version", &record.version_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Records of one task, newest first. `None` or `Some(0)` means no limit.
    pub fn records_by_task(&self, task_id: i64, limit: Option<usize>) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records WHERE task_id = ?1 {} LIMIT ?2",
            RECORD_COLUMNS, NEWEST_FIRST
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![task_id, sql_limit(limit)], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Records of every task, newest first.
    pub fn all_records(&self, limit: Option<usize>) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records {} LIMIT ?1",
            RECORD_COLUMNS, NEWEST_FIRST
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([sql_limit(limit)], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Records grouped by task id, each group newest first. Tasks without
    /// records map to an empty list.
    pub fn records_for_tasks(&self, task_ids: &[i64]) -> Result<HashMap<i64, Vec<Record>>> {
        let mut grouped: HashMap<i64, Vec<Record>> =
            task_ids.iter().map(|id| (*id, Vec::new())).collect();

        for chunk in task_ids.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT {} FROM records WHERE task_id IN ({}) {}",
                RECORD_COLUMNS,
                placeholders(chunk.len()),
                NEWEST_FIRST
            );
            let mut stmt = self.conn().prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), record_from_row)?;
            for row in rows {
                let record = row?;
                grouped.entry(record.task_id).or_default().push(record);
            }
        }
        Ok(grouped)
    }

    /// The successful record of `task_id` with `version_id`.
    pub fn record_by_task_and_version(&self, task_id: i64, version_id: &str) -> Result<Record> {
        let sql = format!(
            "SELECT {} FROM records WHERE task_id = ?1 AND version_id = ?2 AND status = 1",
            RECORD_COLUMNS
        );
        self.conn()
            .query_row(&sql, params![task_id, version_id], record_from_row)
            .optional()?
            .ok_or_else(|| {
                Error::not_found(
                    "Backup record",
                    format!("task {} version {}", task_id, version_id),
                )
            })
    }

    /// The most recent successful record of `task_id`.
    pub fn latest_record(&self, task_id: i64) -> Result<Record> {
        let sql = format!(
            "SELECT {} FROM records WHERE task_id = ?1 AND status = 1 {} LIMIT 1",
            RECORD_COLUMNS, NEWEST_FIRST
        );
        self.conn()
            .query_row(&sql, [task_id], record_from_row)
            .optional()?
            .ok_or_else(|| Error::not_found("Successful backup record", format!("task {}", task_id)))
    }

    /// Every failed record, newest first.
    pub fn failed_records(&self) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records WHERE status = 0 {}",
            RECORD_COLUMNS, NEWEST_FIRST
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Deletes every record of a task; returns the number removed.
    pub fn delete_records_by_task(&self, task_id: i64) -> Result<usize> {
        let deleted = self
            .conn()
            .execute("DELETE FROM records WHERE task_id = ?1", [task_id])?;
        debug!(task_id, deleted, "Deleted task records");
        Ok(deleted)
    }

    /// Deletes the given records in batched IN clauses; returns the number
    /// removed.
    pub fn delete_records_by_ids(&self, ids: &[i64]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in ids.chunks(IN_CHUNK) {
            let sql = format!(
                "DELETE FROM records WHERE id IN ({})",
                placeholders(chunk.len())
            );
            deleted += self.conn().execute(&sql, params_from_iter(chunk.iter()))?;
        }
        Ok(deleted)
    }

    /// Deletes every failed record; returns the number removed.
    pub fn delete_failed_records(&self) -> Result<usize> {
        let deleted = self
            .conn()
            .execute("DELETE FROM records WHERE status = 0", [])?;
        info!(deleted, "Deleted failed records");
        Ok(deleted)
    }
}

#[cfg(test)]
pub(crate) fn record_for(task_id: i64, version: &str, status: bool, path: &str) -> NewRecord {
    NewRecord {
        task_id,
        task_name: "docs".to_string(),
        version_id: version.to_string(),
        archive_filename: std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        archive_size: if status { 128 } else { 0 },
        storage_path: path.to_string(),
        status,
        failure_message: if status {
            String::new()
        } else {
            "source missing".to_string()
        },
        checksum: if status { "abc123".to_string() } else { String::new() },
    }
}
