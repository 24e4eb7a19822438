//! List command

use anyhow::{Context, Result};
use bakctl_core::models::utc_to_local;
use bakctl_core::{format_bytes, RuleList, Task};
use tabled::{Table, Tabled};
use tracing::{debug, warn};

use crate::cli::ListArgs;
use crate::output::{self, or_dash};
use crate::utils::open_store;

/// Row for the full task table
#[derive(Tabled)]
struct TaskRow {
    id: i64,
    name: String,
    source: String,
    storage: String,
    #[tabled(rename = "retain count")]
    retain_count: u32,
    #[tabled(rename = "retain days")]
    retain_days: u32,
    compress: String,
    include: String,
    exclude: String,
    #[tabled(rename = "max size")]
    max_size: String,
    #[tabled(rename = "min size")]
    min_size: String,
    created: String,
}

/// Row for `--simple`
#[derive(Tabled)]
struct SimpleTaskRow {
    id: i64,
    name: String,
    source: String,
    storage: String,
}

fn size_cell(bytes: u64) -> String {
    if bytes == 0 {
        output::EMPTY_CELL.to_string()
    } else {
        format_bytes(bytes)
    }
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            source: task.source_dir.clone(),
            storage: task.storage_dir.clone(),
            retain_count: task.retain_count,
            retain_days: task.retain_days,
            compress: if task.compress { "yes" } else { "no" }.to_string(),
            include: or_dash(&task.include_rules.display(", ")),
            exclude: or_dash(&task.exclude_rules.display(", ")),
            max_size: size_cell(task.max_file_size),
            min_size: size_cell(task.min_file_size),
            created: utc_to_local(&task.created_at),
        }
    }
}

impl From<&Task> for SimpleTaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            source: task.source_dir.clone(),
            storage: task.storage_dir.clone(),
        }
    }
}

pub fn run(args: ListArgs) -> Result<()> {
    let store = open_store()?;

    // Drop records whose archives were removed outside bakctl.
    let spinner = output::spinner("Checking archives...");
    let cleaned = store.cleanup_orphans(None);
    spinner.finish_and_clear();
    match cleaned {
        Ok(0) => {}
        Ok(n) => debug!("Removed {} orphan records", n),
        Err(e) => warn!("Orphan cleanup failed: {}", e),
    }

    let tasks = store.all_tasks()?;

    if args.json {
        let json = serde_json::to_string_pretty(&tasks).context("Failed to serialize tasks")?;
        println!("{}", json);
        return Ok(());
    }

    if tasks.is_empty() {
        output::info("No backup tasks yet. Add one with: bakctl add --name <NAME> --source-dir <DIR>");
        return Ok(());
    }

    let table = if args.simple {
        Table::new(tasks.iter().map(SimpleTaskRow::from))
    } else {
        Table::new(tasks.iter().map(TaskRow::from))
    };
    output::print_table(table, args.style);
    Ok(())
}
