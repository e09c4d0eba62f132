//! Change detection pipeline
//!
//! [`ChangeDetector`] runs one detection cycle as a linear transaction:
//!
//! 1. load the previous snapshot from the store
//! 2. fingerprint the traversal entries into a new snapshot
//! 3. diff the two and pair renames
//! 4. hand the result to the reporter
//! 5. save the new snapshot as the next run's baseline
//!
//! The snapshot is only saved after the reporter succeeds. Any failure
//! leaves the previous snapshot in the store, so the next run sees the same
//! baseline and reports the same changes again.
//!
//! Runs are not reentrant. Callers that can start overlapping runs against
//! one store must serialize them, for instance with [`RunLock`](crate::store::RunLock).
//!
//! ## Example
//!
//! ```rust,no_run
//! use snapdiff::{DetectorBuilder, FileSnapshotStore, NoOpReporter, RenamePolicy, Scanner};
//! use std::path::PathBuf;
//!
//! # fn main() -> snapdiff::Result<()> {
//! let root = PathBuf::from("./data");
//! let store = FileSnapshotStore::create("./state")?;
//! let detector = DetectorBuilder::new()
//!     .hash_threshold(32 * 1024 * 1024)
//!     .rename_policy(RenamePolicy::ContentOnly)
//!     .build(root.clone(), store)?;
//!
//! let entries = Scanner::new(root).scan()?;
//! let summary = detector.run(&entries, &mut NoOpReporter, None)?;
//! println!("{} changes", summary.result.stats().total_operations());
//! # Ok(())
//! # }
//! ```

use crate::diff;
use crate::error::{Result, SnapdiffError};
use crate::fingerprint::{FingerprintGenerator, DEFAULT_HASH_THRESHOLD};
use crate::rename::RenamePolicy;
use crate::report::ChangeReporter;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use crate::types::{DiffResult, ProgressCallback, ProgressInfo, ScanEntry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Settings for a [`ChangeDetector`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Root that relative paths are computed against
    pub root_path: PathBuf,
    /// Largest file size (inclusive) that is content-hashed
    pub hash_threshold: u64,
    /// Fingerprinting worker threads
    pub parallel_workers: usize,
    /// Which fingerprints may pair renames
    pub rename_policy: RenamePolicy,
}

impl DetectorConfig {
    /// Default settings for `root_path`
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            hash_threshold: DEFAULT_HASH_THRESHOLD,
            parallel_workers: num_cpus::get(),
            rename_policy: RenamePolicy::default(),
        }
    }

    /// Check the settings without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.hash_threshold == 0 {
            return Err(SnapdiffError::InvalidConfiguration(
                "hash threshold must be greater than zero".to_string(),
            ));
        }
        if self.parallel_workers == 0 {
            return Err(SnapdiffError::InvalidConfiguration(
                "parallel workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ChangeDetector`]
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    hash_threshold: u64,
    parallel_workers: usize,
    rename_policy: RenamePolicy,
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBuilder {
    /// Builder with default settings
    pub fn new() -> Self {
        Self {
            hash_threshold: DEFAULT_HASH_THRESHOLD,
            parallel_workers: num_cpus::get(),
            rename_policy: RenamePolicy::default(),
        }
    }

    /// Largest file size in bytes that is content-hashed (default 10 MiB)
    pub fn hash_threshold(mut self, bytes: u64) -> Self {
        self.hash_threshold = bytes;
        self
    }

    /// Fingerprinting worker threads (minimum 1, default one per CPU)
    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Which fingerprints may pair renames
    pub fn rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.rename_policy = policy;
        self
    }

    /// Build a detector for `root_path` backed by `store`
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::RootNotFound`] if the root is not a directory
    /// - [`SnapdiffError::InvalidConfiguration`] for a zero threshold
    pub fn build<S: SnapshotStore>(self, root_path: PathBuf, store: S) -> Result<ChangeDetector<S>> {
        let config = DetectorConfig {
            root_path,
            hash_threshold: self.hash_threshold,
            parallel_workers: self.parallel_workers,
            rename_policy: self.rename_policy,
        };
        ChangeDetector::with_config(config, store)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Classified changes
    pub result: DiffResult,
    /// The previous snapshot was empty
    pub bootstrap: bool,
    /// Files in the new snapshot
    pub files_scanned: usize,
    /// Files in the new snapshot carrying a metadata fingerprint
    pub metadata_fallbacks: usize,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

/// Detects changes between runs over one root
#[derive(Debug)]
pub struct ChangeDetector<S> {
    config: DetectorConfig,
    generator: FingerprintGenerator,
    store: S,
}

impl<S: SnapshotStore> ChangeDetector<S> {
    /// Detector from explicit settings
    pub fn with_config(config: DetectorConfig, store: S) -> Result<Self> {
        config.validate()?;
        if !config.root_path.is_dir() {
            return Err(SnapdiffError::RootNotFound(config.root_path.clone()));
        }

        let generator = FingerprintGenerator::new(config.root_path.clone())
            .with_threshold(config.hash_threshold)
            .with_parallel_workers(config.parallel_workers);

        debug!(
            "Change detector for {:?} (threshold {} bytes, {} workers, {:?})",
            config.root_path, config.hash_threshold, config.parallel_workers, config.rename_policy
        );

        Ok(Self {
            config,
            generator,
            store,
        })
    }

    /// Settings in use
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Root being watched
    pub fn root_path(&self) -> &Path {
        &self.config.root_path
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one detection cycle and rotate the stored snapshot
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::RootNotFound`] if the root disappeared
    /// - any load error from the store (corrupt snapshot, missing store)
    /// - the reporter's error; the snapshot is not saved
    /// - [`SnapdiffError::SnapshotPersist`] if the save fails; the previous
    ///   snapshot is kept
    #[instrument(skip(self, entries, reporter, progress), fields(root = ?self.config.root_path))]
    pub fn run(
        &self,
        entries: &[ScanEntry],
        reporter: &mut dyn ChangeReporter,
        progress: Option<ProgressCallback>,
    ) -> Result<RunSummary> {
        info!("Starting change detection over {} entries", entries.len());
        let start = Instant::now();

        let (current, previous, result) = self.compute(entries, progress)?;

        let report_start = Instant::now();
        if let Err(e) = reporter.report(&result) {
            warn!("Reporter failed, keeping previous snapshot: {}", e);
            return Err(e);
        }
        debug!("Reported changes in {:?}", report_start.elapsed());

        let save_start = Instant::now();
        self.store.save(&current)?;
        debug!("Saved snapshot in {:?}", save_start.elapsed());

        let summary = RunSummary {
            bootstrap: previous.is_empty(),
            files_scanned: current.len(),
            metadata_fallbacks: current.metadata_fingerprint_count(),
            duration_ms: start.elapsed().as_millis() as u64,
            result,
        };

        let stats = summary.result.stats();
        info!(
            "Run complete: {} added, {} modified, {} deleted, {} renamed ({} files, {} ms)",
            stats.files_added,
            stats.files_modified,
            stats.files_deleted,
            stats.files_renamed,
            summary.files_scanned,
            summary.duration_ms
        );

        Ok(summary)
    }

    /// Compute the changes without reporting or saving
    pub fn preview(&self, entries: &[ScanEntry], progress: Option<ProgressCallback>) -> Result<DiffResult> {
        let (_, _, result) = self.compute(entries, progress)?;
        Ok(result)
    }

    fn compute(
        &self,
        entries: &[ScanEntry],
        progress: Option<ProgressCallback>,
    ) -> Result<(Snapshot, Snapshot, DiffResult)> {
        if !self.config.root_path.is_dir() {
            return Err(SnapdiffError::RootNotFound(self.config.root_path.clone()));
        }

        // Store problems surface before any file is read
        let phase = Instant::now();
        let previous = self.store.load()?;
        debug!("Loaded previous snapshot ({} records) in {:?}", previous.len(), phase.elapsed());
        if previous.is_empty() {
            info!("No previous snapshot, every file will be reported as added");
        }

        let phase = Instant::now();
        let callback = progress.map(|cb| move |info: ProgressInfo| cb(info));
        let current = self.generator.fingerprint_all(entries, callback)?;
        debug!("Fingerprint phase took {:?}", phase.elapsed());

        let phase = Instant::now();
        let result = diff::compare(&previous, &current, self.config.rename_policy);
        debug!("Diff and rename resolution took {:?}", phase.elapsed());

        Ok((current, previous, result))
    }
}
