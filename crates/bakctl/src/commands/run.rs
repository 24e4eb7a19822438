//! Run command

use anyhow::{anyhow, bail, Result};
use bakctl_backup::{BackupExecutor, BatchSummary, RunReport};
use bakctl_core::format_bytes;
use console::style;

use crate::cli::{RunArgs, TaskSelection};
use crate::commands::resolve_tasks;
use crate::output;
use crate::utils::{format_duration, open_store, progress_enabled};

/// Exit code used when a run is interrupted with Ctrl-C
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

pub async fn run(args: RunArgs, quiet: bool) -> Result<()> {
    let selection = args.selection.selection()?;
    let progress = progress_enabled(quiet);

    let worker = tokio::task::spawn_blocking(move || execute(&selection, progress));

    tokio::select! {
        joined = worker => joined.map_err(|e| anyhow!("Backup worker failed: {}", e))?,
        Ok(()) = tokio::signal::ctrl_c() => {
            output::warning(
                "Interrupted: the archive being written may be incomplete and its record was not saved",
            );
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

fn execute(selection: &TaskSelection, progress: bool) -> Result<()> {
    let store = open_store()?;
    let tasks = resolve_tasks(&store, selection)?;

    output::header(&format!(
        "Running {} backup task{}",
        tasks.len(),
        if tasks.len() == 1 { "" } else { "s" }
    ));

    let summary = BackupExecutor::new(&store)
        .with_progress(progress)
        .run_batch(&tasks);

    for item in &summary.items {
        match &item.result {
            Ok(report) => print_report(report),
            Err(e) => output::error(&format!(
                "{} (id {}): {}",
                item.task_name, item.task_id, e
            )),
        }
    }

    finish(&summary)
}

fn print_report(report: &RunReport) {
    output::success(&format!(
        "{} (id {}) backed up in {}",
        report.task_name,
        report.task_id,
        format_duration(report.duration)
    ));
    output::kv("Archive", &report.archive_path.display().to_string());
    output::kv(
        "Size",
        &format!(
            "{} ({} files)",
            format_bytes(report.archive_size),
            report.file_count
        ),
    );
    output::kv("Checksum", &report.checksum);
    output::kv("Version", &report.version_id);
    if let Some(retention) = &report.retention {
        if retention.deleted_files > 0 {
            output::kv(
                "Retention",
                &format!(
                    "removed {} of {} archives",
                    retention.deleted_files, retention.total_files
                ),
            );
        }
        if !retention.error_files.is_empty() {
            output::warning(&format!(
                "{} old archives could not be removed",
                retention.error_files.len()
            ));
        }
    }
}

fn finish(summary: &BatchSummary) -> Result<()> {
    let total = summary.success_count + summary.failure_count;
    if total > 1 {
        println!();
        println!(
            "{} succeeded, {} failed",
            style(summary.success_count).green(),
            style(summary.failure_count).red()
        );
    }
    if !summary.all_succeeded() {
        bail!("{} of {} backups failed", summary.failure_count, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reports_failures() {
        let ok = BatchSummary {
            success_count: 2,
            failure_count: 0,
            items: Vec::new(),
        };
        assert!(finish(&ok).is_ok());

        let failed = BatchSummary {
            success_count: 1,
            failure_count: 1,
            items: Vec::new(),
        };
        let err = finish(&failed).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 backups failed");
    }
}
