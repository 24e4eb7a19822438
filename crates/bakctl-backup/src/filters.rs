//! File filtering for backup operations.
//!
//! A task carries include rules, exclude rules and optional size bounds.
//! Rules are glob patterns matched against the path relative to the source
//! directory and against the bare file name. Exclude always wins over include.

use bakctl_core::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Filter options handed to the archive adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Files smaller than this are skipped; 0 disables.
    pub min_size: u64,
    /// Files larger than this are skipped; 0 disables.
    pub max_size: u64,
}

/// Compiled form of [`FilterOptions`].
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    min_size: u64,
    max_size: u64,
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::invalid_pattern(pattern, e))?;
        builder.add(glob);
    }

    let set = builder
        .build()
        .map_err(|e| Error::invalid_pattern(patterns.join(","), e))?;
    Ok(Some(set))
}

fn set_matches(set: &GlobSet, rel_path: &Path) -> bool {
    set.is_match(rel_path) || rel_path.file_name().is_some_and(|name| set.is_match(name))
}

impl FileFilter {
    /// Compiles the rule lists.
    pub fn new(options: &FilterOptions) -> Result<Self> {
        Ok(Self {
            include: build_globset(&options.include)?,
            exclude: build_globset(&options.exclude)?,
            min_size: options.min_size,
            max_size: options.max_size,
        })
    }

    /// True when a directory should be pruned from the walk.
    pub fn excludes_dir(&self, rel_path: &Path) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|set| set_matches(set, rel_path))
    }

    /// True when a regular file belongs in the archive.
    pub fn accepts_file(&self, rel_path: &Path, size: u64) -> bool {
        if let Some(exclude) = &self.exclude {
            if set_matches(exclude, rel_path) {
                return false;
            }
        }
        if let Some(include) = &self.include {
            if !set_matches(include, rel_path) {
                return false;
            }
        }
        if self.min_size > 0 && size < self.min_size {
            return false;
        }
        if self.max_size > 0 && size > self.max_size {
            return false;
        }
        true
    }

    /// True when include rules restrict the archive to matching files.
    pub fn has_includes(&self) -> bool {
        self.include.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str], min: u64, max: u64) -> FileFilter {
        FileFilter::new(&FilterOptions {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            min_size: min,
            max_size: max,
        })
        .unwrap()
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let f = filter(&[], &[], 0, 0);
        assert!(f.accepts_file(Path::new("a.txt"), 0));
        assert!(f.accepts_file(Path::new("deep/dir/b.log"), u64::MAX));
        assert!(!f.excludes_dir(Path::new("deep")));
        assert!(!f.has_includes());
    }

    #[test]
    fn test_exclude_matches_nested_files() {
        let f = filter(&[], &["*.log"], 0, 0);
        assert!(f.accepts_file(Path::new("a.txt"), 10));
        assert!(!f.accepts_file(Path::new("b.log"), 20));
        assert!(!f.accepts_file(Path::new("sub/c.log"), 20));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let f = filter(&["*.txt"], &["secret.txt"], 0, 0);
        assert!(f.accepts_file(Path::new("notes.txt"), 1));
        assert!(!f.accepts_file(Path::new("dir/secret.txt"), 1));
        assert!(!f.accepts_file(Path::new("image.png"), 1));
    }

    #[test]
    fn test_directory_pruning_by_name() {
        let f = filter(&[], &["node_modules"], 0, 0);
        assert!(f.excludes_dir(Path::new("web/node_modules")));
        assert!(!f.excludes_dir(Path::new("web/src")));
    }

    #[test]
    fn test_size_bounds() {
        let f = filter(&[], &[], 10, 100);
        assert!(!f.accepts_file(Path::new("small"), 9));
        assert!(f.accepts_file(Path::new("edge-low"), 10));
        assert!(f.accepts_file(Path::new("edge-high"), 100));
        assert!(!f.accepts_file(Path::new("big"), 101));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileFilter::new(&FilterOptions {
            include: vec!["[unclosed".to_string()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
