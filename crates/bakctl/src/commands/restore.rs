//! Restore command

use anyhow::{Context, Result};
use bakctl_backup::{restore, RestoreRequest, RestoreVersion};
use bakctl_core::format_bytes;

use crate::cli::RestoreArgs;
use crate::output;
use crate::utils::{format_duration, open_store, progress_enabled};

pub fn run(args: RestoreArgs, quiet: bool) -> Result<()> {
    let version = args.version()?;
    let store = open_store()?;
    let task = store.task_by_id(args.id)?;

    output::header(&format!("Restore '{}'", task.name));
    match &version {
        RestoreVersion::Id(vid) => output::kv("Version", vid),
        RestoreVersion::Latest => output::kv("Version", "latest"),
    }

    let outcome = restore(
        &store,
        &RestoreRequest {
            task_id: task.id,
            version,
            target_dir: args.target.clone(),
            progress_enabled: progress_enabled(quiet),
        },
    )
    .with_context(|| format!("Restore of '{}' failed", task.name))?;

    output::kv("Source", &outcome.archive_path.display().to_string());
    output::kv("Target", &outcome.target_dir.display().to_string());
    output::kv("Backup time", &outcome.record.created_at_local());
    output::kv(
        "Checksum",
        if outcome.verified {
            "verified"
        } else {
            "not recorded, skipped"
        },
    );
    output::kv(
        "Extracted",
        &format!(
            "{} files, {}",
            outcome.file_count,
            format_bytes(outcome.total_bytes)
        ),
    );
    output::kv("Duration", &format_duration(outcome.duration));
    output::success(&format!(
        "Restored version {} of '{}'",
        outcome.record.version_id, task.name
    ));
    Ok(())
}
