//! TOML task import.
//!
//! `bakctl add --config FILE` reads a `[AddTaskConfig]` table whose keys
//! mirror the task attributes. Sizes may be given as byte counts or as
//! strings with a `B`/`KB`/`MB`/`GB` suffix.

use crate::error::Result;
use crate::models::{TaskConfig, DEFAULT_RETAIN_COUNT, DEFAULT_RETAIN_DAYS};
use crate::size::parse_size;
use serde::Deserialize;
use std::path::Path;

/// File name written by `add --generate-template`.
pub const TEMPLATE_FILENAME: &str = "add_task.toml";

/// Root of the import file.
#[derive(Debug, Deserialize)]
pub struct RootConfig {
    #[serde(rename = "AddTaskConfig")]
    pub add_task: AddTaskConfig,
}

/// A size given either as raw bytes or as a suffixed string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    /// Resolves the value to bytes.
    pub fn to_bytes(&self) -> Result<u64> {
        match self {
            SizeValue::Bytes(b) => Ok(*b),
            SizeValue::Text(s) => parse_size(s),
        }
    }
}

impl Default for SizeValue {
    fn default() -> Self {
        SizeValue::Bytes(0)
    }
}

/// The `[AddTaskConfig]` table.
#[derive(Debug, Deserialize)]
pub struct AddTaskConfig {
    pub name: String,
    pub source_dir: String,
    #[serde(default)]
    pub storage_dir: String,
    #[serde(default = "default_retain_count")]
    pub retain_count: u32,
    #[serde(default = "default_retain_days")]
    pub retain_days: u32,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub include_rules: Vec<String>,
    #[serde(default)]
    pub exclude_rules: Vec<String>,
    #[serde(default)]
    pub max_file_size: SizeValue,
    #[serde(default)]
    pub min_file_size: SizeValue,
}

fn default_retain_count() -> u32 {
    DEFAULT_RETAIN_COUNT
}

fn default_retain_days() -> u32 {
    DEFAULT_RETAIN_DAYS
}

impl AddTaskConfig {
    /// Parses an import file from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let root: RootConfig = toml::from_str(content)?;
        Ok(root.add_task)
    }

    /// Loads an import file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Converts to a task config, resolving size suffixes.
    pub fn into_task_config(self) -> Result<TaskConfig> {
        Ok(TaskConfig {
            max_file_size: self.max_file_size.to_bytes()?,
            min_file_size: self.min_file_size.to_bytes()?,
            name: self.name,
            source_dir: self.source_dir,
            storage_dir: self.storage_dir,
            retain_count: self.retain_count,
            retain_days: self.retain_days,
            compress: self.compress,
            include_rules: self.include_rules,
            exclude_rules: self.exclude_rules,
        })
    }
}

/// Commented template written by `add --generate-template`.
pub fn template() -> String {
    format!(
        r#"# bakctl task definition
# Import with: bakctl add --config {file}

[AddTaskConfig]
# Task name (required, unique)
name = "docs"

# Directory to back up (required)
source_dir = "/home/user/docs"

# Where archives are stored; empty uses ~/.bakctl/bak.
# Archives land in <storage_dir>/<basename of source_dir>.
storage_dir = ""

# Archives kept per day (0 disables the count limit)
retain_count = {count}

# Age window in days (0 disables the age limit)
retain_days = {days}

# Deflate-compress archive entries
compress = false

# Only back up files matching these globs (empty backs up everything)
include_rules = []

# Skip files matching these globs; exclude wins over include
exclude_rules = ["*.tmp", "*.log"]

# Size bounds, bytes or with B/KB/MB/GB suffix (0 disables)
max_file_size = "0"
min_file_size = "0"
"#,
        file = TEMPLATE_FILENAME,
        count = DEFAULT_RETAIN_COUNT,
        days = DEFAULT_RETAIN_DAYS,
    )
}

/// Writes the template into `dir`, refusing to overwrite an existing file.
pub fn write_template(dir: &Path) -> Result<std::path::PathBuf> {
    let path = dir.join(TEMPLATE_FILENAME);
    if path.exists() {
        return Err(crate::error::Error::already_exists(
            "Template file",
            path.display(),
        ));
    }
    std::fs::write(&path, template())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_with_suffixes() {
        let cfg = AddTaskConfig::from_toml_str(
            r#"
[AddTaskConfig]
name = "docs"
source_dir = "/tmp/src"
compress = true
exclude_rules = ["*.log"]
max_file_size = "10MB"
min_file_size = 1024
"#,
        )
        .unwrap()
        .into_task_config()
        .unwrap();

        assert_eq!(cfg.name, "docs");
        assert!(cfg.compress);
        assert_eq!(cfg.exclude_rules, vec!["*.log"]);
        assert_eq!(cfg.max_file_size, 10 * 1024 * 1024);
        assert_eq!(cfg.min_file_size, 1024);
        assert_eq!(cfg.retain_count, DEFAULT_RETAIN_COUNT);
        assert_eq!(cfg.retain_days, DEFAULT_RETAIN_DAYS);
    }

    #[test]
    fn test_missing_root_table() {
        assert!(AddTaskConfig::from_toml_str("name = \"docs\"").is_err());
    }

    #[test]
    fn test_bad_size_suffix() {
        let cfg = AddTaskConfig::from_toml_str(
            r#"
[AddTaskConfig]
name = "docs"
source_dir = "/tmp/src"
max_file_size = "10XB"
"#,
        )
        .unwrap();
        assert!(cfg.into_task_config().is_err());
    }

    #[test]
    fn test_template_parses() {
        let cfg = AddTaskConfig::from_toml_str(&template()).unwrap();
        assert_eq!(cfg.name, "docs");
        assert_eq!(cfg.exclude_rules.len(), 2);
    }

    #[test]
    fn test_write_template_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path()).unwrap();
        assert!(path.exists());
        assert!(write_template(tmp.path()).is_err());
    }
}
