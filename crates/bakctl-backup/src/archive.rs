//! Zip archive creation and extraction.
//!
//! `pack` walks a source directory, applies the task's filters and streams
//! every accepted file into a single zip archive. The archive is written to a
//! hidden temporary file next to the destination and only renamed into place
//! once complete, so a failed pack leaves nothing behind.
//!
//! `unpack` checks every target path before writing anything and refuses to
//! overwrite existing files unless asked to.

use crate::filters::{FileFilter, FilterOptions};
use crate::progress::ArchiveProgress;
use bakctl_core::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Compression applied to archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Entries are stored as-is
    #[default]
    None,
    /// Deflate at the codec's default level
    Default,
}

impl CompressionLevel {
    /// Maps a task's `compress` flag to a level.
    pub fn from_compress(compress: bool) -> Self {
        if compress {
            CompressionLevel::Default
        } else {
            CompressionLevel::None
        }
    }

    fn file_options(self) -> SimpleFileOptions {
        let method = match self {
            CompressionLevel::None => CompressionMethod::Stored,
            CompressionLevel::Default => CompressionMethod::Deflated,
        };
        SimpleFileOptions::default().compression_method(method)
    }
}

/// Options for [`pack`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub compression_level: CompressionLevel,
    pub overwrite_existing: bool,
    pub filter: FilterOptions,
    pub progress_enabled: bool,
}

/// Options for [`unpack`].
#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    pub overwrite_existing: bool,
    pub progress_enabled: bool,
    /// Accept entry names that escape the target directory after sanitising
    /// them instead of rejecting the archive.
    pub disable_path_validation: bool,
}

/// Result of a pack operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackStats {
    /// Files written into the archive
    pub file_count: usize,
    /// Directory entries written into the archive
    pub dir_count: usize,
    /// Sum of the uncompressed file sizes
    pub total_bytes: u64,
    /// Files rejected by the filter
    pub skipped: usize,
}

/// Result of an unpack operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackStats {
    pub file_count: usize,
    pub total_bytes: u64,
}

struct PackEntry {
    abs: PathBuf,
    name: String,
    size: u64,
    is_dir: bool,
}

/// Packs `source_dir` into the archive file `dest`.
pub fn pack(dest: &Path, source_dir: &Path, options: &PackOptions) -> Result<PackStats> {
    if !source_dir.is_dir() {
        return Err(Error::not_found(
            "Source directory",
            source_dir.display().to_string(),
        ));
    }
    if dest.exists() && !options.overwrite_existing {
        return Err(Error::already_exists("Archive", dest.display()));
    }

    if dest.starts_with(source_dir) {
        return Err(Error::invalid_config(format!(
            "Archive {} would be written inside the source directory",
            dest.display()
        )));
    }

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let filter = FileFilter::new(&options.filter)?;

    let mut progress = options.progress_enabled.then(ArchiveProgress::new);
    if let Some(p) = progress.as_mut() {
        p.start_scan("Scanning files...");
    }

    let (entries, mut stats) = scan(source_dir, &filter)?;

    if let Some(p) = progress.as_mut() {
        p.finish_scan(&format!("Found {} files to back up", stats.file_count));
        p.start_files(stats.file_count as u64, "Packing");
    }

    let tmp = tempfile::Builder::new()
        .prefix(".bakctl-")
        .suffix(".part")
        .tempfile_in(&parent)?;

    let written = write_zip(tmp.as_file(), &entries, options.compression_level, progress.as_ref());
    if let Some(p) = &progress {
        p.finish_all();
    }
    written?;

    if options.overwrite_existing {
        tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    } else {
        tmp.persist_noclobber(dest).map_err(|e| Error::Io(e.error))?;
    }

    stats.total_bytes = entries.iter().filter(|e| !e.is_dir).map(|e| e.size).sum();
    info!(
        archive = %dest.display(),
        files = stats.file_count,
        skipped = stats.skipped,
        "Archive created"
    );
    Ok(stats)
}

/// Walks the source tree and returns the entries to archive, in stable order.
fn scan(source_dir: &Path, filter: &FileFilter) -> Result<(Vec<PackEntry>, PackStats)> {
    let mut entries = Vec::new();
    let mut stats = PackStats::default();

    let walker = WalkDir::new(source_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let rel = e.path().strip_prefix(source_dir).unwrap_or(e.path());
            !filter.excludes_dir(rel)
        });

    for entry in walker {
        let entry = entry.map_err(|e| Error::archive(format!("Failed to walk directory: {}", e)))?;
        if entry.depth() == 0 {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| Error::archive(format!("Failed to compute relative path: {}", e)))?;
        let name = entry_name(rel);

        if entry.file_type().is_dir() {
            // With include rules the tree is implied by the matching files.
            if !filter.has_includes() {
                entries.push(PackEntry {
                    abs: entry.path().to_path_buf(),
                    name: format!("{}/", name),
                    size: 0,
                    is_dir: true,
                });
                stats.dir_count += 1;
            }
            continue;
        }

        if !entry.file_type().is_file() {
            debug!("Skipping non-regular file {}", entry.path().display());
            continue;
        }

        let size = entry
            .metadata()
            .map_err(|e| Error::archive(format!("Failed to stat {}: {}", entry.path().display(), e)))?
            .len();

        if filter.accepts_file(rel, size) {
            entries.push(PackEntry {
                abs: entry.path().to_path_buf(),
                name,
                size,
                is_dir: false,
            });
            stats.file_count += 1;
        } else {
            stats.skipped += 1;
        }
    }

    Ok((entries, stats))
}

/// Zip entry names always use forward slashes.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_zip(
    file: &File,
    entries: &[PackEntry],
    level: CompressionLevel,
    progress: Option<&ArchiveProgress>,
) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(file));

    for entry in entries {
        if entry.is_dir {
            zip.add_directory(entry.name.clone(), level.file_options())?;
            continue;
        }

        let mut opts = level
            .file_options()
            .large_file(entry.size >= ZIP64_THRESHOLD);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = std::fs::metadata(&entry.abs) {
                opts = opts.unix_permissions(meta.permissions().mode());
            }
        }

        zip.start_file(entry.name.clone(), opts)?;
        let mut reader = BufReader::new(File::open(&entry.abs)?);
        io::copy(&mut reader, &mut zip)?;

        if let Some(p) = progress {
            p.inc_file();
        }
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    Ok(())
}

/// Extracts `archive` into `target_dir`.
pub fn unpack(archive: &Path, target_dir: &Path, options: &UnpackOptions) -> Result<UnpackStats> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    // Resolve and check every destination before touching the target.
    let mut plan = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        let rel = if options.disable_path_validation {
            entry.mangled_name()
        } else {
            entry.enclosed_name().ok_or_else(|| {
                Error::archive(format!("Unsafe entry path in archive: {}", entry.name()))
            })?
        };
        let out = target_dir.join(&rel);
        if !entry.is_dir() && out.exists() && !options.overwrite_existing {
            return Err(Error::already_exists("File", out.display()));
        }
        plan.push((i, out, entry.is_dir()));
    }

    std::fs::create_dir_all(target_dir)?;

    let mut progress = options.progress_enabled.then(ArchiveProgress::new);
    let file_total = plan.iter().filter(|(_, _, is_dir)| !is_dir).count();
    if let Some(p) = progress.as_mut() {
        p.start_files(file_total as u64, "Extracting");
    }

    let mut stats = UnpackStats::default();
    for (i, out, is_dir) in plan {
        if is_dir {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entry = zip.by_index(i)?;
        let mut writer = BufWriter::new(File::create(&out)?);
        stats.total_bytes += io::copy(&mut entry, &mut writer)?;
        io::Write::flush(&mut writer)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out, std::fs::Permissions::from_mode(mode))?;
            }
        }

        stats.file_count += 1;
        if let Some(p) = &progress {
            p.inc_file();
        }
    }

    if let Some(p) = &progress {
        p.finish_all();
    }
    info!(
        archive = %archive.display(),
        target = %target_dir.display(),
        files = stats.file_count,
        "Archive extracted"
    );
    Ok(stats)
}
