//! Export tasks as shell text.
//!
//! Two forms are produced: `add` command lines that recreate each task, and
//! runner scripts that start every selected task in parallel.

use bakctl_core::models::{DEFAULT_RETAIN_COUNT, DEFAULT_RETAIN_DAYS};
use bakctl_core::{Result, Task};
use std::fmt::Write;

/// Characters that make a POSIX shell or cmd.exe reinterpret a bare word.
const SHELL_SPECIAL: &[char] = &[
    ' ', '\t', '\n', '"', '\'', '\\', '$', '`', '*', '?', '[', ']', '{', '}', '(', ')', '<',
    '>', '|', '&', ';', '!', '#', '~', '%', '^', '=',
];

/// Runner script flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Windows batch file
    Bat,
    /// POSIX shell script
    Sh,
}

impl ScriptKind {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptKind::Bat => "bat",
            ScriptKind::Sh => "sh",
        }
    }
}

/// What an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportForm {
    /// One `add` command per task
    Commands,
    /// A runner script
    Script(ScriptKind),
}

/// Renders `tasks` in the requested form.
///
/// Fails when a task's stored rules cannot be decoded, since its `add`
/// command could not be reproduced.
pub fn export(program: &str, tasks: &[Task], form: ExportForm) -> Result<String> {
    match form {
        ExportForm::Commands => add_commands(program, tasks),
        ExportForm::Script(ScriptKind::Bat) => Ok(bat_script(program, tasks)),
        ExportForm::Script(ScriptKind::Sh) => Ok(sh_script(program, tasks)),
    }
}

/// Quotes a value when the shell would otherwise split, expand or
/// reinterpret it.
pub fn quote(value: &str) -> String {
    if value.is_empty() || value.contains(SHELL_SPECIAL) {
        double_quote(value)
    } else {
        value.to_string()
    }
}

/// Wraps a value in double quotes, escaping the characters that stay
/// active inside them.
pub fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Builds the `add` command that recreates `task`. Flags equal to their
/// defaults are left out. Rules are always quoted, one flag per rule.
pub fn add_command(program: &str, task: &Task) -> Result<String> {
    let mut cmd = format!(
        "{} add --name {} --source-dir {}",
        program,
        quote(&task.name),
        quote(&task.source_dir)
    );

    // The stored storage dir has the source basename appended; `add` derives
    // it again from the parent.
    let storage = task.user_storage_dir();
    let _ = write!(
        cmd,
        " --storage-dir {}",
        quote(&storage.to_string_lossy())
    );

    if task.retain_count != DEFAULT_RETAIN_COUNT {
        let _ = write!(cmd, " --retain-count {}", task.retain_count);
    }
    if task.retain_days != DEFAULT_RETAIN_DAYS {
        let _ = write!(cmd, " --retain-days {}", task.retain_days);
    }
    if task.compress {
        cmd.push_str(" --compress");
    }
    for rule in task.include()? {
        let _ = write!(cmd, " --include {}", double_quote(&rule));
    }
    for rule in task.exclude()? {
        let _ = write!(cmd, " --exclude {}", double_quote(&rule));
    }
    if task.max_file_size > 0 {
        let _ = write!(cmd, " --max-size {}", task.max_file_size);
    }
    if task.min_file_size > 0 {
        let _ = write!(cmd, " --min-size {}", task.min_file_size);
    }
    Ok(cmd)
}

fn add_commands(program: &str, tasks: &[Task]) -> Result<String> {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&add_command(program, task)?);
        out.push('\n');
    }
    Ok(out)
}

fn bat_script(program: &str, tasks: &[Task]) -> String {
    let mut out = String::from("@echo off\r\n");
    for task in tasks {
        let _ = write!(out, "start {} run --id {}\r\n", program, task.id);
    }
    out
}

fn sh_script(program: &str, tasks: &[Task]) -> String {
    let mut out = String::from("#!/usr/bin/env bash\n\n");
    for task in tasks {
        let _ = writeln!(out, "( {} run --id {} ) &", program, task.id);
        let _ = writeln!(out, "pid{}=$!", task.id);
    }
    if !tasks.is_empty() {
        out.push_str("\nwait");
        for task in tasks {
            let _ = write!(out, " $pid{}", task.id);
        }
        out.push('\n');
    }
    out
}
