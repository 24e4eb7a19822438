//! bakctl backup engine
//!
//! Everything that touches archives on disk: creating them, verifying them,
//! pruning old ones and restoring them.
//!
//! # Features
//!
//! - **Zip archives**: stored or deflated, written atomically through a
//!   temporary file
//! - **Rule filtering**: include/exclude globs and size bounds per task
//! - **Checksums**: streaming md5/sha1/sha256/sha512, sha1 for new records
//! - **Retention**: count and age limits with a last-archive fail-safe
//! - **Guaranteed records**: every backup attempt writes exactly one record
//! - **Export**: `add` command lines and parallel runner scripts
//!
//! # Examples
//!
//! ```no_run
//! use bakctl_backup::BackupExecutor;
//! use bakctl_store::Store;
//! use std::path::Path;
//!
//! fn main() -> bakctl_core::Result<()> {
//!     let store = Store::bootstrap(Path::new("/home/user/.bakctl"), "bakctl.db3")?;
//!     let task = store.task_by_id(1)?;
//!
//!     let report = BackupExecutor::new(&store).run(&task)?;
//!     println!("Backup created: {} ({} bytes)", report.archive_path.display(), report.archive_size);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod executor;
pub mod export;
pub mod filters;
pub mod hash;
pub mod progress;
pub mod restore;
pub mod retention;

// Re-export commonly used types
pub use archive::{pack, unpack, CompressionLevel, PackOptions, PackStats, UnpackOptions};
pub use executor::{BackupExecutor, BatchItem, BatchSummary, RunReport};
pub use export::{add_command, export, ExportForm, ScriptKind};
pub use filters::{FileFilter, FilterOptions};
pub use hash::{checksum, HashAlgorithm, DEFAULT_ALGORITHM};
pub use restore::{restore, RestoreOutcome, RestoreRequest, RestoreVersion};
pub use retention::{RetentionPolicy, RetentionReport, RetentionRequest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
