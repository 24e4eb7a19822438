//! Orphan record cleanup.
//!
//! A record is an orphan when it claims success but its archive no longer
//! exists on disk (deleted by retention, by hand, or lost with a disk).
//! Failed records never point at an archive and are left alone.

use crate::Store;
use bakctl_core::Result;
use std::path::Path;
use tracing::{debug, info};

impl Store {
    /// Deletes successful records whose `storage_path` does not exist.
    ///
    /// `task_id` limits the sweep to one task; `None` sweeps every task.
    /// Returns the number of records removed.
    pub fn cleanup_orphans(&self, task_id: Option<i64>) -> Result<usize> {
        let (sql, scope): (&str, Vec<i64>) = match task_id {
            Some(id) => (
                "SELECT id, storage_path FROM records WHERE status = 1 AND task_id = ?1",
                vec![id],
            ),
            None => ("SELECT id, storage_path FROM records WHERE status = 1", vec![]),
        };

        let orphans = {
            let mut stmt = self.conn().prepare(sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(scope.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut orphans = Vec::new();
            for row in rows {
                let (id, storage_path) = row?;
                if !Path::new(&storage_path).exists() {
                    debug!(record_id = id, path = %storage_path, "Orphan record");
                    orphans.push(id);
                }
            }
            orphans
        };

        if orphans.is_empty() {
            return Ok(0);
        }

        let deleted = self.delete_records_by_ids(&orphans)?;
        info!(deleted, "Removed orphan records");
        Ok(deleted)
    }
}
