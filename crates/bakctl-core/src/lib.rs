//! # bakctl-core
//!
//! Core library for the bakctl CLI providing:
//! - Task and record models with input validation
//! - The JSON rule codec used for include/exclude lists
//! - The archive naming template shared by the executor and retention engine
//! - TOML task import and size parsing
//! - Default data locations under `~/.bakctl`

pub mod config;
pub mod error;
pub mod models;
pub mod naming;
pub mod paths;
pub mod rules;
pub mod size;

pub use config::AddTaskConfig;
pub use error::{Error, Result};
pub use models::{NewRecord, NewTask, Record, Task, TaskConfig, TaskUpdate};
pub use naming::{archive_filename, ArchiveMatcher, ARCHIVE_EXTENSION};
pub use rules::RuleList;
pub use size::{format_bytes, parse_size};
