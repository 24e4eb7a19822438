//! Progress reporting for pack, unpack and hashing.
//!
//! Provides visual feedback during long-running archive and checksum
//! operations. Every reporter is optional: callers pass `None` when
//! progress is disabled and the helpers become no-ops.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Progress reporter for archive creation and extraction.
#[derive(Debug, Clone)]
pub struct ArchiveProgress {
    multi: Arc<MultiProgress>,
    scan_bar: Option<ProgressBar>,
    file_bar: Option<ProgressBar>,
}

impl ArchiveProgress {
    /// Creates a new archive progress reporter.
    pub fn new() -> Self {
        Self {
            multi: Arc::new(MultiProgress::new()),
            scan_bar: None,
            file_bar: None,
        }
    }

    /// Starts the scanning phase spinner.
    pub fn start_scan(&mut self, message: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.scan_bar = Some(bar);
    }

    /// Finishes the scanning phase.
    pub fn finish_scan(&self, message: &str) {
        if let Some(bar) = &self.scan_bar {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Starts the per-file phase with a known file count.
    pub fn start_files(&mut self, total_files: u64, message: &str) {
        let bar = self.multi.add(ProgressBar::new(total_files));
        bar.set_style(bar_style(
            "{msg} [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%)",
        ));
        bar.set_message(message.to_string());
        self.file_bar = Some(bar);
    }

    /// Advances the file bar by one.
    pub fn inc_file(&self) {
        if let Some(bar) = &self.file_bar {
            bar.inc(1);
        }
    }

    /// Finishes and clears all bars.
    pub fn finish_all(&self) {
        if let Some(bar) = &self.scan_bar {
            bar.finish_and_clear();
        }
        if let Some(bar) = &self.file_bar {
            bar.finish_and_clear();
        }
    }
}

impl Default for ArchiveProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte-level progress for checksum computation.
#[derive(Debug)]
pub struct ByteProgress {
    bar: ProgressBar,
}

impl ByteProgress {
    /// Starts a byte bar of `total` bytes.
    pub fn new(total: u64, message: &str) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(bar_style(
            "{msg} [{bar:40.green/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        ));
        bar.set_message(message.to_string());
        Self { bar }
    }

    /// Adds `n` processed bytes.
    pub fn inc(&self, n: u64) {
        self.bar.inc(n);
    }

    /// Finishes and clears the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
