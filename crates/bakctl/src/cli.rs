//! CLI argument parsing with clap

use anyhow::{bail, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;

use bakctl_backup::{ExportForm, RestoreVersion, ScriptKind};

/// bakctl - directory backups with retention
#[derive(Parser, Debug)]
#[command(name = "bakctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a backup task
    Add(AddArgs),

    /// Change settings of existing tasks
    Edit(EditArgs),

    /// List backup tasks
    List(ListArgs),

    /// Show backup records
    Log(LogArgs),

    /// Run backup tasks
    Run(RunArgs),

    /// Delete tasks or failed records
    Delete(DeleteArgs),

    /// Restore an archive into a directory
    Restore(RestoreArgs),

    /// Export tasks as add commands or a runner script
    Export(ExportArgs),
}

/// Which tasks a command applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelection {
    One(i64),
    /// Explicit ids, in the order given
    Many(Vec<i64>),
    All,
}

fn check_unique(ids: &[i64]) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            bail!("Duplicate task id in --ids: {}", id);
        }
    }
    Ok(())
}

/// `--id`, `--ids` or `--all`
#[derive(Args, Debug, Clone)]
#[group(id = "selection", required = true, multiple = false)]
pub struct SelectionArgs {
    /// Task id
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub id: Option<i64>,

    /// Comma-separated task ids
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(i64).range(1..))]
    pub ids: Option<Vec<i64>>,

    /// Every task
    #[arg(long)]
    pub all: bool,
}

impl SelectionArgs {
    pub fn selection(&self) -> Result<TaskSelection> {
        match (self.id, &self.ids, self.all) {
            (Some(id), None, false) => Ok(TaskSelection::One(id)),
            (None, Some(ids), false) => {
                check_unique(ids)?;
                Ok(TaskSelection::Many(ids.clone()))
            }
            (None, None, true) => Ok(TaskSelection::All),
            _ => bail!("Specify exactly one of --id, --ids or --all"),
        }
    }
}

// Add command
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task name
    #[arg(short, long, required_unless_present_any = ["config", "generate_template"])]
    pub name: Option<String>,

    /// Directory to back up
    #[arg(short, long, required_unless_present_any = ["config", "generate_template"])]
    pub source_dir: Option<String>,

    /// Archive storage root (default: ~/.bakctl/bak)
    #[arg(short = 'd', long)]
    pub storage_dir: Option<String>,

    /// Archives kept per day (0 disables the count limit)
    #[arg(long, default_value_t = bakctl_core::models::DEFAULT_RETAIN_COUNT)]
    pub retain_count: u32,

    /// Days archives are kept (0 disables the age limit)
    #[arg(long, default_value_t = bakctl_core::models::DEFAULT_RETAIN_DAYS)]
    pub retain_days: u32,

    /// Deflate archive entries
    #[arg(long)]
    pub compress: bool,

    /// Include patterns (comma-separated, repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Exclude patterns (comma-separated, repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Skip files larger than this (e.g. 10MB)
    #[arg(long)]
    pub max_size: Option<String>,

    /// Skip files smaller than this (e.g. 1KB)
    #[arg(long)]
    pub min_size: Option<String>,

    /// Read the task from a TOML file
    #[arg(long, conflicts_with_all = ["name", "source_dir", "storage_dir", "include", "exclude", "max_size", "min_size", "compress"])]
    pub config: Option<PathBuf>,

    /// Write an add_task.toml template into the current directory
    #[arg(long, exclusive = true)]
    pub generate_template: bool,
}

// Edit command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["id", "ids"])))]
pub struct EditArgs {
    /// Task id
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub id: Option<i64>,

    /// Comma-separated task ids
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(i64).range(1..))]
    pub ids: Option<Vec<i64>>,

    /// New count limit
    #[arg(long)]
    pub retain_count: Option<u32>,

    /// New age limit in days
    #[arg(long)]
    pub retain_days: Option<u32>,

    /// Enable or disable compression
    #[arg(long, value_name = "true|false")]
    pub compress: Option<bool>,

    /// Replace include patterns
    #[arg(long, conflicts_with = "clear_include")]
    pub include: Vec<String>,

    /// Replace exclude patterns
    #[arg(long, conflicts_with = "clear_exclude")]
    pub exclude: Vec<String>,

    /// Remove all include patterns
    #[arg(long)]
    pub clear_include: bool,

    /// Remove all exclude patterns
    #[arg(long)]
    pub clear_exclude: bool,

    /// New maximum file size (0 disables)
    #[arg(long)]
    pub max_size: Option<String>,

    /// New minimum file size (0 disables)
    #[arg(long)]
    pub min_size: Option<String>,
}

impl EditArgs {
    pub fn task_ids(&self) -> Result<Vec<i64>> {
        match (self.id, &self.ids) {
            (Some(id), None) => Ok(vec![id]),
            (None, Some(ids)) => {
                check_unique(ids)?;
                Ok(ids.clone())
            }
            _ => bail!("Specify exactly one of --id or --ids"),
        }
    }
}

/// Table border style
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum TableStyle {
    #[default]
    Sharp,
    Rounded,
    Modern,
    Ascii,
    Psql,
    Markdown,
    Blank,
}

// List command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show id, name and directories
    #[arg(long)]
    pub simple: bool,

    /// Table style
    #[arg(long, value_enum, default_value_t = TableStyle::Sharp)]
    pub style: TableStyle,

    /// Output as JSON
    #[arg(long, conflicts_with_all = ["simple", "style"])]
    pub json: bool,
}

// Log command
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Task id
    #[arg(long, conflicts_with = "name", value_parser = clap::value_parser!(i64).range(1..))]
    pub id: Option<i64>,

    /// Task name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Number of records to show (0 shows all)
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Table style
    #[arg(long, value_enum, default_value_t = TableStyle::Sharp)]
    pub style: TableStyle,

    /// Output as JSON
    #[arg(long, conflicts_with = "style")]
    pub json: bool,
}

// Run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// What to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Tasks(TaskSelection),
    FailedRecords,
}

// Delete command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["id", "ids", "failed"])))]
pub struct DeleteArgs {
    /// Task id
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub id: Option<i64>,

    /// Comma-separated task ids
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(i64).range(1..))]
    pub ids: Option<Vec<i64>>,

    /// Delete every failed record
    #[arg(long)]
    pub failed: bool,

    /// Skip confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Keep archive files on disk
    #[arg(long)]
    pub keep_files: bool,
}

impl DeleteArgs {
    pub fn target(&self) -> Result<DeleteTarget> {
        match (self.id, &self.ids, self.failed) {
            (Some(id), None, false) => Ok(DeleteTarget::Tasks(TaskSelection::One(id))),
            (None, Some(ids), false) => {
                check_unique(ids)?;
                Ok(DeleteTarget::Tasks(TaskSelection::Many(ids.clone())))
            }
            (None, None, true) => Ok(DeleteTarget::FailedRecords),
            _ => bail!("Specify exactly one of --id, --ids or --failed"),
        }
    }
}

// Restore command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("restore_version").required(true).args(["vid", "latest"])))]
pub struct RestoreArgs {
    /// Task id
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub id: i64,

    /// Version id of the record to restore
    #[arg(long)]
    pub vid: Option<String>,

    /// Restore the newest successful backup
    #[arg(long)]
    pub latest: bool,

    /// Directory to extract into
    #[arg(short = 'd', long, default_value = ".")]
    pub target: PathBuf,
}

impl RestoreArgs {
    pub fn version(&self) -> Result<RestoreVersion> {
        match (&self.vid, self.latest) {
            (Some(vid), false) => Ok(RestoreVersion::Id(vid.clone())),
            (None, true) => Ok(RestoreVersion::Latest),
            _ => bail!("Specify exactly one of --vid or --latest"),
        }
    }
}

// Export command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("form").required(true).args(["cmd", "script"])))]
#[command(group(ArgGroup::new("kind").args(["bat", "sh"])))]
pub struct ExportArgs {
    /// Emit add commands that recreate the tasks
    #[arg(long)]
    pub cmd: bool,

    /// Emit a runner script
    #[arg(long, requires = "kind")]
    pub script: bool,

    /// Windows batch script
    #[arg(long, requires = "script")]
    pub bat: bool,

    /// POSIX shell script
    #[arg(long, requires = "script")]
    pub sh: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    pub fn form(&self) -> Result<ExportForm> {
        match (self.cmd, self.script, self.bat, self.sh) {
            (true, false, false, false) => Ok(ExportForm::Commands),
            (false, true, true, false) => Ok(ExportForm::Script(ScriptKind::Bat)),
            (false, true, false, true) => Ok(ExportForm::Script(ScriptKind::Sh)),
            _ => bail!("Use --cmd, or --script with exactly one of --bat or --sh"),
        }
    }
}
