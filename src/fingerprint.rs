//! Fingerprint generation
//!
//! Turns one traversal entry into a [`FileRecord`]. Files at or below the
//! hashing threshold get a SHA-256 content digest; larger files, and files
//! whose content cannot be read, get a metadata fingerprint built from their
//! exact size and last-write time. Unreadable files never fail a run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use snapdiff::fingerprint::FingerprintGenerator;
//! use snapdiff::types::{ProgressInfo, ScanEntry};
//! use std::path::PathBuf;
//!
//! # fn example(entries: Vec<ScanEntry>) -> snapdiff::Result<()> {
//! let generator = FingerprintGenerator::new(PathBuf::from("/data/project"))
//!     .with_threshold(64 * 1024 * 1024)
//!     .with_parallel_workers(4);
//!
//! let snapshot = generator.fingerprint_all::<fn(ProgressInfo)>(&entries, None)?;
//! println!("{} files, {} metadata fingerprints", snapshot.len(), snapshot.metadata_fingerprint_count());
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SnapdiffError};
use crate::snapshot::Snapshot;
use crate::types::{FileRecord, Fingerprint, ProgressInfo, ScanEntry};
use crate::utils;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Default hashing threshold: 10 MiB
pub const DEFAULT_HASH_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Computes fingerprints for files under one scan root
#[derive(Debug, Clone)]
pub struct FingerprintGenerator {
    /// Root that relative paths are computed against
    root_path: PathBuf,
    /// Largest size (inclusive) that is content-hashed
    threshold: u64,
    /// Worker threads used by [`FingerprintGenerator::fingerprint_all`]
    parallel_workers: usize,
}

impl FingerprintGenerator {
    /// Create a generator with the default threshold and one worker per CPU
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            threshold: DEFAULT_HASH_THRESHOLD,
            parallel_workers: num_cpus::get(),
        }
    }

    /// Set the hashing threshold in bytes
    ///
    /// Files whose size is less than or equal to the threshold are
    /// content-hashed.
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set number of parallel workers (minimum 1)
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Scan root relative paths are computed against
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Configured hashing threshold
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Fingerprint one file
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::PathOutsideRoot`] if the entry is not under the
    ///   scan root (or is the root itself)
    ///
    /// Content read failures are not errors; they produce a metadata
    /// fingerprint.
    pub fn fingerprint_file(&self, entry: &ScanEntry) -> Result<FileRecord> {
        let relative = utils::make_relative(&entry.path, &self.root_path)?;
        let rel_path = utils::rel_path_key(&relative).ok_or_else(|| SnapdiffError::PathOutsideRoot {
            path: entry.path.clone(),
            root: self.root_path.clone(),
        })?;

        let fingerprint = self.fingerprint_for(entry);

        Ok(FileRecord {
            rel_path,
            size: entry.size,
            modified: entry.modified,
            fingerprint,
        })
    }

    fn fingerprint_for(&self, entry: &ScanEntry) -> Fingerprint {
        let fallback = || Fingerprint::Metadata {
            size: entry.size,
            modified: entry.modified,
        };

        if entry.size > self.threshold {
            trace!(
                "Using metadata fingerprint for {:?} ({} bytes > {} byte threshold)",
                entry.path,
                entry.size,
                self.threshold
            );
            return fallback();
        }

        match utils::hash_file_content(&entry.path) {
            Ok(hex) => Fingerprint::Content(hex),
            Err(e) => {
                warn!("Could not hash {:?}, falling back to metadata fingerprint: {}", entry.path, e);
                fallback()
            }
        }
    }

    /// Fingerprint many files on a bounded worker pool
    ///
    /// Records are assembled into a [`Snapshot`] afterwards, so the result
    /// does not depend on the order in which workers finish.
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::ThreadPool`] if the worker pool cannot be built
    /// - [`SnapdiffError::PathOutsideRoot`] for an entry outside the root
    /// - [`SnapdiffError::DuplicatePath`] if two entries map to one path
    pub fn fingerprint_all<F>(&self, entries: &[ScanEntry], progress_callback: Option<F>) -> Result<Snapshot>
    where
        F: Fn(ProgressInfo) + Send + Sync,
    {
        let start = Instant::now();
        let processed = AtomicUsize::new(0);
        let bytes_processed = AtomicU64::new(0);
        let total = entries.len();
        let total_bytes: u64 = entries.iter().map(|e| e.size).sum();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_workers)
            .build()?;

        let records: Vec<FileRecord> = pool.install(|| {
            entries
                .par_iter()
                .map(|entry| {
                    let record = self.fingerprint_file(entry)?;

                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    let bytes = bytes_processed.fetch_add(entry.size, Ordering::Relaxed) + entry.size;
                    if let Some(ref callback) = progress_callback {
                        callback(ProgressInfo {
                            operation: "Fingerprinting files".to_string(),
                            current_item: Some(record.rel_path.clone()),
                            processed: done,
                            total: Some(total),
                            bytes_processed: bytes,
                            total_bytes: Some(total_bytes),
                        });
                    }

                    Ok(record)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let snapshot = Snapshot::from_records(records)?;

        debug!(
            "Fingerprinted {} files ({} metadata fallbacks) in {:?}",
            snapshot.len(),
            snapshot.metadata_fingerprint_count(),
            start.elapsed()
        );

        Ok(snapshot)
    }
}
