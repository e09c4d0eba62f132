//! Directory traversal
//!
//! Produces the [`ScanEntry`] list the change detector consumes. Traversal
//! uses the `ignore` crate walker: `.gitignore` files are honoured at every
//! level without needing a git repository, hidden files are included, and
//! custom patterns in gitignore syntax are applied as overrides on top.
//!
//! Only regular files are returned. Directories are walked but not listed,
//! and symlinks are skipped unless [`Scanner::with_follow_symlinks`] is set.

use crate::error::{Result, SnapdiffError};
use crate::types::ScanEntry;
use crate::utils;
use chrono::{DateTime, Utc};
use ignore::{overrides::OverrideBuilder, WalkBuilder, WalkState};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Walks a root directory and collects regular files
#[derive(Debug, Clone)]
pub struct Scanner {
    root_path: PathBuf,
    ignore_patterns: Vec<String>,
    exclude_dirs: Vec<PathBuf>,
    follow_symlinks: bool,
    parallel_workers: usize,
}

impl Scanner {
    /// Scanner over `root_path` with default settings
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            ignore_patterns: Vec::new(),
            exclude_dirs: Vec::new(),
            follow_symlinks: false,
            parallel_workers: num_cpus::get(),
        }
    }

    /// Add exclusion patterns in gitignore syntax
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns.extend(patterns);
        self
    }

    /// Skip a directory entirely
    ///
    /// Used for the snapshot store when it lives inside the scanned tree.
    /// Directories outside the root are ignored.
    pub fn with_exclude_dir(mut self, dir: PathBuf) -> Self {
        self.exclude_dirs.push(dir);
        self
    }

    /// Follow symbolic links
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Walker threads (minimum 1)
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Root being scanned
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Walk the root and return its regular files sorted by path
    ///
    /// Entries that cannot be read during the walk are logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::RootNotFound`] if the root is missing or not a directory
    /// - [`SnapdiffError::Walk`] if an ignore pattern is invalid
    pub fn scan(&self) -> Result<Vec<ScanEntry>> {
        if !self.root_path.is_dir() {
            return Err(SnapdiffError::RootNotFound(self.root_path.clone()));
        }

        let start = Instant::now();

        let mut walker_builder = WalkBuilder::new(&self.root_path);
        walker_builder
            .follow_links(self.follow_symlinks)
            .hidden(false)
            .parents(true)
            .ignore(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .threads(self.parallel_workers);
        walker_builder.overrides(self.build_overrides()?);

        let entries = Mutex::new(Vec::<ScanEntry>::new());
        let follow = self.follow_symlinks;
        let root = &self.root_path;

        walker_builder.build_parallel().run(|| {
            let entries = &entries;
            Box::new(move |entry_result| {
                let entry = match entry_result {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Walk error: {}", e);
                        return WalkState::Continue;
                    }
                };

                let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
                let is_link = entry.path_is_symlink();
                if !is_file || (is_link && !follow) {
                    return WalkState::Continue;
                }

                let path = entry.path();
                // Snapshot keys are UTF-8; lossy conversion would collide
                if !has_utf8_key(path, root) {
                    warn!("Skipping {:?}: path is not valid UTF-8", path);
                    return WalkState::Continue;
                }

                match entry_metadata(path, is_link) {
                    Ok((size, modified)) => {
                        trace!("Found {:?} ({} bytes)", path, size);
                        entries.lock().push(ScanEntry {
                            path: path.to_path_buf(),
                            size,
                            modified,
                        });
                    }
                    Err(e) => warn!("Skipping {:?}: {}", path, e),
                }

                WalkState::Continue
            })
        });

        let mut entries = entries.into_inner();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            "Scanned {} files under {:?} in {:?}",
            entries.len(),
            self.root_path,
            start.elapsed()
        );

        Ok(entries)
    }

    fn build_overrides(&self) -> Result<ignore::overrides::Override> {
        let mut override_builder = OverrideBuilder::new(&self.root_path);

        for dir in &self.exclude_dirs {
            let Ok(relative) = utils::make_relative(dir, &self.root_path) else {
                continue;
            };
            let Some(key) = utils::rel_path_key(&relative) else {
                continue;
            };
            for pattern in [format!("!/{key}"), format!("!/{key}/**")] {
                override_builder
                    .add(&pattern)
                    .map_err(|e| SnapdiffError::Walk(format!("exclude {:?}: {}", dir, e)))?;
            }
        }

        // A bare override glob whitelists and hides everything else, so every
        // user pattern is added as an exclusion
        for pattern in &self.ignore_patterns {
            override_builder
                .add(&format!("!{pattern}"))
                .map_err(|e| SnapdiffError::Walk(format!("invalid ignore pattern '{}': {}", pattern, e)))?;
        }

        override_builder
            .build()
            .map_err(|e| SnapdiffError::Walk(e.to_string()))
    }
}

fn has_utf8_key(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .map(|relative| relative.to_str().is_some())
        .unwrap_or(false)
}

/// Size and modification time, resolving the link target when `is_link`
fn entry_metadata(path: &Path, is_link: bool) -> Result<(u64, DateTime<Utc>)> {
    if is_link {
        let metadata = std::fs::metadata(path)?;
        Ok((metadata.len(), DateTime::<Utc>::from(metadata.modified()?)))
    } else {
        let metadata = utils::get_file_metadata(path)?;
        Ok((metadata.size, metadata.modified))
    }
}
