//! Terminal output for bakctl commands.
//!
//! Results and hints go to stdout, problems to stderr, each line led by a
//! coloured status marker. Colours follow `console`'s global switch, which
//! `--no-color` turns off.

use crate::cli::TableStyle;
use console::{style, StyledObject, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tabled::settings::Style;
use tabled::Table;

/// Placeholder for empty table cells
pub const EMPTY_CELL: &str = "---";

/// Indentation of key/value lines under a header
const KV_INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Success,
    Error,
    Warning,
    Info,
}

impl Marker {
    fn styled(self) -> StyledObject<&'static str> {
        match self {
            Marker::Success => style("✓").green().bold(),
            Marker::Error => style("✗").red().bold(),
            Marker::Warning => style("⚠").yellow().bold(),
            Marker::Info => style("ℹ").blue().bold(),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Marker::Error | Marker::Warning)
    }

    fn line(self, msg: &str) -> String {
        format!("{} {}", self.styled(), msg)
    }

    fn print(self, msg: &str) {
        if self.to_stderr() {
            eprintln!("{}", self.line(msg));
        } else {
            println!("{}", self.line(msg));
        }
    }
}

/// ✓ on stdout
pub fn success(msg: &str) {
    Marker::Success.print(msg);
}

/// ✗ on stderr
pub fn error(msg: &str) {
    Marker::Error.print(msg);
}

/// ⚠ on stderr
pub fn warning(msg: &str) {
    Marker::Warning.print(msg);
}

/// ℹ on stdout
pub fn info(msg: &str) {
    Marker::Info.print(msg);
}

/// Section title, preceded by a blank line
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Indented `key: value` line
pub fn kv(key: &str, value: &str) {
    println!("{}{}: {}", KV_INDENT, style(key).dim(), value);
}

/// `value`, or the empty-cell marker
pub fn or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        EMPTY_CELL.to_string()
    } else {
        value.to_string()
    }
}

/// Applies a border style and prints the table
pub fn print_table(mut table: Table, table_style: TableStyle) {
    match table_style {
        TableStyle::Sharp => table.with(Style::sharp()),
        TableStyle::Rounded => table.with(Style::rounded()),
        TableStyle::Modern => table.with(Style::modern()),
        TableStyle::Ascii => table.with(Style::ascii()),
        TableStyle::Psql => table.with(Style::psql()),
        TableStyle::Markdown => table.with(Style::markdown()),
        TableStyle::Blank => table.with(Style::blank()),
    };
    println!("{}", table);
}

/// Spinner on stderr; hidden when stderr is not a terminal so piped
/// output stays clean.
pub fn spinner(msg: &str) -> ProgressBar {
    if !Term::stderr().is_term() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
