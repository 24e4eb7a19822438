//! Delete command

use anyhow::{bail, Context, Result};
use bakctl_core::Task;
use bakctl_store::Store;
use dialoguer::Confirm;
use std::path::Path;
use tracing::{debug, warn};

use crate::cli::{DeleteArgs, DeleteTarget};
use crate::commands::resolve_tasks;
use crate::output;
use crate::utils::open_store;

/// What deleting one task removed
#[derive(Debug, Default, PartialEq, Eq)]
struct Removed {
    records: usize,
    files: usize,
    file_errors: usize,
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Confirmation prompt failed (use --force in non-interactive shells)")
}

pub fn run(args: DeleteArgs) -> Result<()> {
    let target = args.target()?;
    let store = open_store()?;

    match target {
        DeleteTarget::FailedRecords => delete_failed(&store, args.force),
        DeleteTarget::Tasks(selection) => {
            let tasks = resolve_tasks(&store, &selection)?;
            delete_tasks(&store, &tasks, args.force, args.keep_files)
        }
    }
}

fn delete_failed(store: &Store, force: bool) -> Result<()> {
    let failed = store.failed_records()?;
    if failed.is_empty() {
        output::info("No failed records to delete");
        return Ok(());
    }

    if !force && !confirm(&format!("Delete {} failed records?", failed.len()))? {
        output::info("Deletion cancelled");
        return Ok(());
    }

    let deleted = store.delete_failed_records()?;
    output::success(&format!("Deleted {} failed records", deleted));
    Ok(())
}

fn delete_tasks(store: &Store, tasks: &[Task], force: bool, keep_files: bool) -> Result<()> {
    output::header("Tasks to delete");
    for task in tasks {
        output::kv(&format!("{} {}", task.id, task.name), &task.storage_dir);
    }
    if keep_files {
        output::info("Archive files will be kept on disk");
    }

    if !force && !confirm(&format!("Delete {} task(s) and their records?", tasks.len()))? {
        output::info("Deletion cancelled");
        return Ok(());
    }

    let mut failed = 0usize;
    for task in tasks {
        match delete_task(store, task, keep_files) {
            Ok(removed) => {
                output::success(&format!(
                    "Deleted task {} ({}): {} records, {} archives",
                    task.id, task.name, removed.records, removed.files
                ));
                if removed.file_errors > 0 {
                    output::warning(&format!(
                        "{} archives of '{}' could not be removed",
                        removed.file_errors, task.name
                    ));
                }
            }
            Err(e) => {
                output::error(&format!("Task {} ({}): {:#}", task.id, task.name, e));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} tasks could not be deleted", failed, tasks.len());
    }
    Ok(())
}

/// Removes a task's archives, its records and then the task itself.
fn delete_task(store: &Store, task: &Task, keep_files: bool) -> Result<Removed> {
    let mut removed = Removed::default();

    if !keep_files {
        for record in store.records_by_task(task.id, None)? {
            let path = Path::new(&record.storage_path);
            if record.storage_path.is_empty() || !path.is_file() {
                continue;
            }
            match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed.files += 1;
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    removed.file_errors += 1;
                }
            }
        }
    }

    removed.records = store.delete_records_by_task(task.id)?;
    store.delete_task(task.id)?;
    Ok(removed)
}
