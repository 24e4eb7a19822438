//! Edit command

use anyhow::{bail, Result};
use bakctl_core::{rules, TaskUpdate};

use crate::cli::EditArgs;
use crate::output;
use crate::utils::{open_store, parse_size_flag};

fn rule_update(values: &[String], clear: bool) -> Option<Vec<String>> {
    if clear {
        Some(Vec::new())
    } else if values.is_empty() {
        None
    } else {
        Some(rules::split_list(values))
    }
}

fn build_update(args: &EditArgs) -> Result<TaskUpdate> {
    Ok(TaskUpdate {
        retain_count: args.retain_count,
        retain_days: args.retain_days,
        compress: args.compress,
        include_rules: rule_update(&args.include, args.clear_include),
        exclude_rules: rule_update(&args.exclude, args.clear_exclude),
        max_file_size: parse_size_flag("--max-size", args.max_size.as_deref())?,
        min_file_size: parse_size_flag("--min-size", args.min_size.as_deref())?,
    })
}

pub fn run(args: EditArgs) -> Result<()> {
    let ids = args.task_ids()?;
    let update = build_update(&args)?;
    if update.is_empty() {
        bail!("Nothing to change: pass at least one setting to edit");
    }

    let store = open_store()?;
    let mut failed = 0usize;
    for id in &ids {
        match store.update_task(*id, &update) {
            Ok(task) => output::success(&format!("Updated task {} ({})", task.id, task.name)),
            Err(e) => {
                output::error(&format!("Task {}: {}", id, e));
                failed += 1;
            }
        }
    }

    if ids.len() > 1 {
        output::info(&format!(
            "{} updated, {} failed",
            ids.len() - failed,
            failed
        ));
    }
    if failed > 0 {
        bail!("{} of {} tasks could not be updated", failed, ids.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_update() {
        assert_eq!(rule_update(&[], false), None);
        assert_eq!(rule_update(&["a".into()], true), Some(vec![]));
        assert_eq!(
            rule_update(&["*.txt, *.md".into()], false),
            Some(vec!["*.txt".to_string(), "*.md".to_string()])
        );
    }
}
