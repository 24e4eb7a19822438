//! Utility functions shared across CLI commands

use anyhow::{Context, Result};
use bakctl_core::{parse_size, paths};
use bakctl_store::Store;
use std::path::Path;
use std::time::Duration;

/// Name the binary was invoked as, used in exported commands
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "bakctl".to_string())
}

/// Opens (and if needed creates) the database under the data root
pub fn open_store() -> Result<Store> {
    let db_path = paths::get_db_path()?;
    Store::open(&db_path).with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// Parses an optional size flag such as `10MB`
pub fn parse_size_flag(flag: &str, value: Option<&str>) -> Result<Option<u64>> {
    value
        .map(|v| parse_size(v).with_context(|| format!("Invalid value for {}", flag)))
        .transpose()
}

/// Human readable duration: `850ms`, `12.3s`, `2m 05s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else if d.as_millis() >= 1000 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Whether progress bars should be drawn
pub fn progress_enabled(quiet: bool) -> bool {
    !quiet && console::Term::stderr().is_term()
}
