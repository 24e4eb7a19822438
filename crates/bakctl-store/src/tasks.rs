//! Task queries.

use crate::{from_db_int, placeholders, to_db_int, Store, IN_CHUNK};
use bakctl_core::{rules, Error, NewTask, Result, RuleList, Task, TaskUpdate};
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

const TASK_COLUMNS: &str = "id, name, retain_count, retain_days, source_dir, storage_dir, \
     compress, include_rules, exclude_rules, max_file_size, min_file_size, \
     COALESCE(created_at, ''), COALESCE(updated_at, '')";

/// Task row as read from SQLite.
struct TaskRow {
    id: i64,
    name: String,
    retain_count: Option<i64>,
    retain_days: Option<i64>,
    source_dir: String,
    storage_dir: String,
    compress: Option<bool>,
    include_rules: Option<String>,
    exclude_rules: Option<String>,
    max_file_size: Option<i64>,
    min_file_size: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            retain_count: row.get(2)?,
            retain_days: row.get(3)?,
            source_dir: row.get(4)?,
            storage_dir: row.get(5)?,
            compress: row.get(6)?,
            include_rules: row.get(7)?,
            exclude_rules: row.get(8)?,
            max_file_size: row.get(9)?,
            min_file_size: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_task(self) -> Task {
        Task {
            id: self.id,
            name: self.name,
            retain_count: clamp_u32(self.retain_count),
            retain_days: clamp_u32(self.retain_days),
            source_dir: self.source_dir,
            storage_dir: self.storage_dir,
            compress: self.compress.unwrap_or(false),
            include_rules: RuleList::from_stored(self.include_rules.unwrap_or_default()),
            exclude_rules: RuleList::from_stored(self.exclude_rules.unwrap_or_default()),
            max_file_size: from_db_int(self.max_file_size),
            min_file_size: from_db_int(self.min_file_size),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn clamp_u32(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

impl Store {
    /// Inserts a validated task and returns its id.
    ///
    /// Fails with `AlreadyExists` when the name is taken.
    pub fn insert_task(&self, task: &NewTask) -> Result<i64> {
        let include = rules::encode(&task.include_rules)?;
        let exclude = rules::encode(&task.exclude_rules)?;

        let result = self.conn().execute(
            "INSERT INTO tasks (name, retain_count, retain_days, source_dir, storage_dir, \
             compress, include_rules, exclude_rules, max_file_size, min_file_size) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.name,
                task.retain_count,
                task.retain_days,
                task.source_dir,
                task.storage_dir,
                task.compress,
                include,
                exclude,
                to_db_int(task.max_file_size)?,
                to_db_int(task.min_file_size)?,
            ],
        );

        match result {
            Ok(_) => {
                let id = self.conn().last_insert_rowid();
                info!(task_id = id, name = %task.name, "Task added");
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::already_exists("Task", &task.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns true if a task with this name exists.
    pub fn task_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(1) FROM tasks WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Looks up a task id by name.
    pub fn task_id_by_name(&self, name: &str) -> Result<i64> {
        self.conn()
            .query_row("SELECT id FROM tasks WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| Error::not_found("Task", name))
    }

    /// Looks up a task name by id.
    pub fn task_name_by_id(&self, id: i64) -> Result<String> {
        self.conn()
            .query_row("SELECT name FROM tasks WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| Error::not_found("Task", id))
    }

    /// Fetches one task.
    pub fn task_by_id(&self, id: i64) -> Result<Task> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let row = self
            .conn()
            .query_row(&sql, [id], TaskRow::from_row)
            .optional()?
            .ok_or_else(|| Error::not_found("Task", id))?;
        Ok(row.into_task())
    }

    /// Fetches the tasks with the given ids, ordered by id. Unknown ids are
    /// silently absent from the result.
    pub fn tasks_by_ids(&self, ids: &[i64]) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT {} FROM tasks WHERE id IN ({}) ORDER BY id",
                TASK_COLUMNS,
                placeholders(chunk.len())
            );
            let mut stmt = self.conn().prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), TaskRow::from_row)?;
            for row in rows {
                tasks.push(row?.into_task());
            }
        }
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    /// All tasks ordered by id.
    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS);
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], TaskRow::from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task());
        }
        Ok(tasks)
    }

    /// Applies `update` to task `id`, touching `updated_at`. Returns the
    /// updated task.
    pub fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<Task> {
        let current = self.task_by_id(id)?;
        let updated = update.apply_to(&current)?;

        let changed = self.conn().execute(
            "UPDATE tasks SET retain_count = ?1, retain_days = ?2, compress = ?3, \
             include_rules = ?4, exclude_rules = ?5, max_file_size = ?6, min_file_size = ?7, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?8",
            params![
                updated.retain_count,
                updated.retain_days,
                updated.compress,
                updated.include_rules.as_stored(),
                updated.exclude_rules.as_stored(),
                to_db_int(updated.max_file_size)?,
                to_db_int(updated.min_file_size)?,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Task", id));
        }

        debug!(task_id = id, "Task updated");
        self.task_by_id(id)
    }

    /// Removes only the task row; its records are left alone.
    pub fn delete_task(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn()
            .execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::not_found("Task", id));
        }
        info!(task_id = id, "Task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::new_task;

    #[test]
    fn test_insert_and_fetch() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_task(&new_task("docs")).unwrap();
        assert!(id > 0);

        let task = store.task_by_id(id).unwrap();
        assert_eq!(task.name, "docs");
        assert_eq!(task.exclude_rules.decode().unwrap(), vec!["*.log"]);
        assert!(task.include_rules.decode().unwrap().is_empty());
        assert!(!task.created_at.is_empty());
    }

    #[test]
    fn test_empty_rules_stored_as_brackets() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_task(&new_task("docs")).unwrap();
        let raw: String = store
            .conn()
            .query_row(
                "SELECT include_rules FROM tasks WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, "[]");
    }

    #[test]
    fn test_malformed_rules_do_not_block_reads() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_task(&new_task("docs")).unwrap();
        store.insert_task(&new_task("other")).unwrap();
        store
            .conn()
            .execute("UPDATE tasks SET include_rules = '[bad' WHERE id = ?1", [id])
            .unwrap();

        let task = store.task_by_id(id).unwrap();
        assert!(task.include_rules.decode().is_err());
        assert_eq!(task.include_rules.as_stored(), "[bad");
        assert_eq!(store.all_tasks().unwrap().len(), 2);

        // Editing another field writes the malformed value back untouched.
        let update = TaskUpdate {
            retain_days: Some(30),
            ..Default::default()
        };
        let task = store.update_task(id, &update).unwrap();
        assert_eq!(task.include_rules.as_stored(), "[bad");

        // Replacing the rules repairs the column.
        let update = TaskUpdate {
            include_rules: Some(vec!["*.md".into()]),
            ..Default::default()
        };
        let task = store.update_task(id, &update).unwrap();
        assert_eq!(task.include_rules.decode().unwrap(), vec!["*.md"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.insert_task(&new_task("docs")).unwrap();
        let err = store.insert_task(&new_task("docs")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert!(store.task_exists("docs").unwrap());
        assert!(!store.task_exists("other").unwrap());
    }

    #[test]
    fn test_lookups() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_task(&new_task("docs")).unwrap();
        assert_eq!(store.task_id_by_name("docs").unwrap(), id);
        assert_eq!(store.task_name_by_id(id).unwrap(), "docs");
        assert!(store.task_id_by_name("nope").unwrap_err().is_not_found());
        assert!(store.task_by_id(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_tasks_by_ids_ordered() {
        let store = Store::open_in_memory().unwrap();
        let a = store.insert_task(&new_task("a")).unwrap();
        let b = store.insert_task(&new_task("b")).unwrap();
        let c = store.insert_task(&new_task("c")).unwrap();

        let tasks = store.tasks_by_ids(&[c, a, 999]).unwrap();
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, c]);

        let all: Vec<i64> = store.all_tasks().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(all, vec![a, b, c]);
    }

    #[test]
    fn test_update_task() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_task(&new_task("docs")).unwrap();

        let update = TaskUpdate {
            retain_count: Some(0),
            compress: Some(true),
            include_rules: Some(vec!["*.md".into()]),
            ..Default::default()
        };
        let task = store.update_task(id, &update).unwrap();
        assert_eq!(task.retain_count, 0);
        assert!(task.compress);
        assert_eq!(task.include_rules.decode().unwrap(), vec!["*.md"]);
        assert_eq!(task.exclude_rules.decode().unwrap(), vec!["*.log"]);

        assert!(store.update_task(999, &update).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_task() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_task(&new_task("docs")).unwrap();
        store.delete_task(id).unwrap();
        assert!(store.delete_task(id).unwrap_err().is_not_found());
        assert!(store.all_tasks().unwrap().is_empty());
    }
}
