//! Add command

use anyhow::{bail, Context, Result};
use bakctl_core::config::{self, AddTaskConfig};
use bakctl_core::{format_bytes, paths, rules, TaskConfig};

use crate::cli::AddArgs;
use crate::output;
use crate::utils::{open_store, parse_size_flag};

pub fn run(args: AddArgs) -> Result<()> {
    if args.generate_template {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let path = config::write_template(&cwd)?;
        output::success(&format!("Template written to {}", path.display()));
        output::info(&format!(
            "Edit it, then run: bakctl add --config {}",
            config::TEMPLATE_FILENAME
        ));
        return Ok(());
    }

    let task_config = match &args.config {
        Some(path) => AddTaskConfig::load(path)
            .and_then(AddTaskConfig::into_task_config)
            .with_context(|| format!("Failed to load task config {}", path.display()))?,
        None => config_from_flags(&args)?,
    };

    // Filesystem checks happen before the database is touched.
    let default_storage = paths::get_default_storage_dir()?;
    let new_task = task_config.resolve(&default_storage)?;

    let store = open_store()?;
    if store.task_exists(&new_task.name)? {
        bail!("Task '{}' already exists", new_task.name);
    }
    let id = store.insert_task(&new_task)?;

    output::success(&format!("Task '{}' added with id {}", new_task.name, id));
    output::kv("Source", &new_task.source_dir);
    output::kv("Storage", &new_task.storage_dir);
    output::kv(
        "Retention",
        &format!(
            "{} per day, {} days",
            new_task.retain_count, new_task.retain_days
        ),
    );
    output::kv("Compress", if new_task.compress { "yes" } else { "no" });
    if !new_task.include_rules.is_empty() {
        output::kv("Include", &new_task.include_rules.join(", "));
    }
    if !new_task.exclude_rules.is_empty() {
        output::kv("Exclude", &new_task.exclude_rules.join(", "));
    }
    if new_task.max_file_size > 0 {
        output::kv("Max file size", &format_bytes(new_task.max_file_size));
    }
    if new_task.min_file_size > 0 {
        output::kv("Min file size", &format_bytes(new_task.min_file_size));
    }
    Ok(())
}

fn config_from_flags(args: &AddArgs) -> Result<TaskConfig> {
    Ok(TaskConfig {
        name: args.name.clone().unwrap_or_default(),
        source_dir: args.source_dir.clone().unwrap_or_default(),
        storage_dir: args.storage_dir.clone().unwrap_or_default(),
        retain_count: args.retain_count,
        retain_days: args.retain_days,
        compress: args.compress,
        include_rules: rules::split_list(&args.include),
        exclude_rules: rules::split_list(&args.exclude),
        max_file_size: parse_size_flag("--max-size", args.max_size.as_deref())?.unwrap_or(0),
        min_file_size: parse_size_flag("--min-size", args.min_size.as_deref())?.unwrap_or(0),
    })
}
