//! CLI command implementations

pub mod add;
pub mod delete;
pub mod edit;
pub mod export;
pub mod list;
pub mod log;
pub mod restore;
pub mod run;

use anyhow::{bail, Result};
use bakctl_core::Task;
use bakctl_store::Store;

use crate::cli::TaskSelection;
use crate::output;

/// Loads the selected tasks. Explicit id lists keep their order; unknown ids
/// are reported and skipped.
pub(crate) fn resolve_tasks(store: &Store, selection: &TaskSelection) -> Result<Vec<Task>> {
    let tasks = match selection {
        TaskSelection::One(id) => vec![store.task_by_id(*id)?],
        TaskSelection::All => store.all_tasks()?,
        TaskSelection::Many(ids) => {
            let mut found = store.tasks_by_ids(ids)?;
            let mut ordered = Vec::with_capacity(found.len());
            for id in ids {
                match found.iter().position(|t| t.id == *id) {
                    Some(pos) => ordered.push(found.swap_remove(pos)),
                    None => output::warning(&format!("Task {} not found, skipping", id)),
                }
            }
            ordered
        }
    };

    if tasks.is_empty() {
        bail!("No tasks match the selection");
    }
    Ok(tasks)
}
