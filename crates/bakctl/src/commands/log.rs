//! Log command

use anyhow::{Context, Result};
use bakctl_core::{format_bytes, Record};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::cli::LogArgs;
use crate::output::{self, or_dash};
use crate::utils::open_store;

#[derive(Tabled)]
struct RecordRow {
    id: i64,
    task: String,
    version: String,
    archive: String,
    size: String,
    status: String,
    checksum: String,
    message: String,
    created: String,
}

impl From<&Record> for RecordRow {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id,
            task: format!("{} ({})", record.task_name, record.task_id),
            version: record.version_id.clone(),
            archive: or_dash(&record.archive_filename),
            size: if record.archive_size == 0 {
                output::EMPTY_CELL.to_string()
            } else {
                format_bytes(record.archive_size)
            },
            status: if record.status { "ok" } else { "failed" }.to_string(),
            checksum: or_dash(&record.checksum),
            message: or_dash(&record.failure_message),
            created: record.created_at_local(),
        }
    }
}

/// JSON shape: the stored record with a local timestamp added
#[derive(Serialize)]
struct RecordJson<'a> {
    #[serde(flatten)]
    record: &'a Record,
    created_at_local: String,
}

pub fn run(args: LogArgs) -> Result<()> {
    let store = open_store()?;
    let limit = Some(args.limit);

    let records = match (&args.id, &args.name) {
        (Some(id), _) => {
            store.task_by_id(*id)?;
            store.records_by_task(*id, limit)?
        }
        (None, Some(name)) => {
            let id = store.task_id_by_name(name)?;
            store.records_by_task(id, limit)?
        }
        (None, None) => store.all_records(limit)?,
    };

    if args.json {
        let rows: Vec<RecordJson> = records
            .iter()
            .map(|record| RecordJson {
                record,
                created_at_local: record.created_at_local(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&rows).context("Failed to serialize records")?;
        println!("{}", json);
        return Ok(());
    }

    if records.is_empty() {
        output::info("No backup records found");
        return Ok(());
    }

    output::print_table(Table::new(records.iter().map(RecordRow::from)), args.style);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: bool) -> Record {
        Record {
            id: 1,
            task_id: 4,
            task_name: "docs".into(),
            version_id: "abc".into(),
            archive_filename: "docs_20250101_120000.zip".into(),
            archive_size: if status { 1536 } else { 0 },
            storage_path: "/backups/docs/docs_20250101_120000.zip".into(),
            status,
            failure_message: if status { String::new() } else { "boom".into() },
            checksum: String::new(),
            created_at: "2025-01-01 12:00:00".into(),
        }
    }

    #[test]
    fn test_row_for_success() {
        let row = RecordRow::from(&record(true));
        assert_eq!(row.task, "docs (4)");
        assert_eq!(row.size, "1.50 KB");
        assert_eq!(row.status, "ok");
        assert_eq!(row.message, "---");
        assert_eq!(row.checksum, "---");
    }

    #[test]
    fn test_row_for_failure() {
        let row = RecordRow::from(&record(false));
        assert_eq!(row.size, "---");
        assert_eq!(row.status, "failed");
        assert_eq!(row.message, "boom");
    }

    #[test]
    fn test_json_includes_local_time() {
        let r = record(true);
        let value = serde_json::to_value(RecordJson {
            record: &r,
            created_at_local: r.created_at_local(),
        })
        .unwrap();
        assert_eq!(value["version_id"], "abc");
        assert!(value["created_at_local"].is_string());
    }
}
