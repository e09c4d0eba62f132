//! Integration tests for snapdiff
//!
//! Drive real directories through several detection runs and check the
//! classification, rotation and failure behaviour end to end.

use ::snapdiff::*;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Test harness: a scanned root plus a file-backed store in a separate dir
pub struct SnapdiffTestHarness {
    pub temp_dir: TempDir,
    pub store_dir: TempDir,
    pub detector: ChangeDetector<FileSnapshotStore>,
    pub scanner: Scanner,
}

impl Default for SnapdiffTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapdiffTestHarness {
    /// Harness with default detector settings
    pub fn new() -> Self {
        Self::with_builder(DetectorBuilder::new().parallel_workers(4))
    }

    /// Harness with custom detector settings
    pub fn with_builder(builder: DetectorBuilder) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();

        let store = FileSnapshotStore::open(store_dir.path()).unwrap();
        let detector = builder.build(temp_dir.path().to_path_buf(), store).unwrap();
        let scanner = Scanner::new(temp_dir.path().to_path_buf()).with_parallel_workers(2);

        Self {
            temp_dir,
            store_dir,
            detector,
            scanner,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store(&self) -> &FileSnapshotStore {
        self.detector.store()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).unwrap();
    }

    pub fn rename(&self, from: &str, to: &str) {
        fs::rename(self.path(from), self.path(to)).unwrap();
    }

    /// Set a file's last-write time to `secs` after the epoch
    pub fn set_mtime(&self, rel: &str, secs: i64) {
        filetime::set_file_mtime(self.path(rel), FileTime::from_unix_time(secs, 0)).unwrap();
    }

    /// Scan and run one detection cycle with no reporter output
    pub fn run(&self) -> Result<RunSummary> {
        self.run_with(&mut NoOpReporter)
    }

    pub fn run_with(&self, reporter: &mut dyn ChangeReporter) -> Result<RunSummary> {
        let entries = self.scanner.scan()?;
        let summary = self.detector.run(&entries, reporter, None)?;
        info!(
            "Run over {} files: {} changes",
            summary.files_scanned,
            summary.result.stats().total_operations()
        );
        Ok(summary)
    }

    /// Scan and compute changes without rotating
    pub fn preview(&self) -> Result<DiffResult> {
        let entries = self.scanner.scan()?;
        self.detector.preview(&entries, None)
    }

    pub fn snapshot_bytes(&self) -> Vec<u8> {
        fs::read(self.store().snapshot_path()).unwrap()
    }
}

/// Store wrapper whose saves can be made to fail
pub struct FlakyStore {
    pub inner: FileSnapshotStore,
    pub fail_saves: std::cell::Cell<bool>,
}

impl SnapshotStore for FlakyStore {
    fn load(&self) -> Result<Snapshot> {
        self.inner.load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_saves.get() {
            return Err(SnapdiffError::SnapshotPersist("disk full".to_string()));
        }
        self.inner.save(snapshot)
    }
}

fn paths(records: &[FileRecord]) -> Vec<&str> {
    records.iter().map(|r| r.rel_path.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_lifecycle() {
        let harness = SnapdiffTestHarness::new();
        harness.write("x.txt", "0123456789");
        harness.write("gone.txt", "bye");
        harness.write("docs/readme.md", "# readme");

        let first = harness.run().unwrap();
        assert!(first.bootstrap);
        assert_eq!(paths(&first.result.added), vec!["docs/readme.md", "gone.txt", "x.txt"]);

        harness.write("x.txt", "0123456789ab");
        harness.remove("gone.txt");
        harness.write("new.txt", "fresh content");

        let second = harness.run().unwrap();
        let result = &second.result;
        assert_eq!(paths(&result.added), vec!["new.txt"]);
        assert_eq!(paths(&result.deleted), vec!["gone.txt"]);
        assert!(result.renamed.is_empty());
        assert_eq!(result.modified.len(), 1);

        let modified = &result.modified[0];
        assert_eq!(modified.rel_path, "x.txt");
        assert_eq!(modified.old_size, 10);
        assert_eq!(modified.new_size, 12);
        assert_ne!(modified.old_fingerprint, modified.new_fingerprint);

        let third = harness.run().unwrap();
        assert!(third.result.is_empty());
    }

    #[test]
    fn test_threshold_boundary() {
        const AT_LIMIT: usize = 10_485_760;

        let harness = SnapdiffTestHarness::new();
        harness.write("at_limit.bin", vec![0u8; AT_LIMIT]);
        harness.write("over_limit.bin", vec![0u8; AT_LIMIT + 1]);

        let summary = harness.run().unwrap();
        assert_eq!(summary.metadata_fallbacks, 1);

        let stored = harness.store().load().unwrap();
        let at = stored.get("at_limit.bin").unwrap();
        let over = stored.get("over_limit.bin").unwrap();
        assert_eq!(at.fingerprint.kind(), FingerprintKind::Content);
        assert_eq!(over.fingerprint.kind(), FingerprintKind::Metadata);
        assert!(over.fingerprint.to_string().starts_with("META:10485761:"));
    }

    #[test]
    fn test_touch_only_changes_metadata_fingerprints() {
        let harness = SnapdiffTestHarness::with_builder(DetectorBuilder::new().hash_threshold(16));
        harness.write("small.txt", "tiny");
        harness.write("large.bin", vec![9u8; 64]);
        harness.set_mtime("small.txt", 1_600_000_000);
        harness.set_mtime("large.bin", 1_600_000_000);
        harness.run().unwrap();

        harness.set_mtime("small.txt", 1_700_000_000);
        harness.set_mtime("large.bin", 1_700_000_000);

        let result = harness.run().unwrap().result;
        assert_eq!(result.modified.len(), 1);
        assert_eq!(result.modified[0].rel_path, "large.bin");
        assert!(result.modified[0].new_fingerprint.is_metadata());
    }

    #[test]
    fn test_rename_of_metadata_fingerprinted_file() {
        let harness = SnapdiffTestHarness::with_builder(DetectorBuilder::new().hash_threshold(16));
        harness.write("video.mp4", vec![1u8; 100]);
        harness.run().unwrap();

        // rename(2) keeps size and mtime, so the metadata tag is unchanged
        harness.rename("video.mp4", "archive.mp4");
        let result = harness.run().unwrap().result;
        assert_eq!(result.renamed.len(), 1);
        assert_eq!(result.renamed[0].from, "video.mp4");
        assert!(result.renamed[0].fingerprint.is_metadata());
    }

    #[test]
    fn test_content_only_policy_reports_add_and_delete() {
        let harness = SnapdiffTestHarness::with_builder(
            DetectorBuilder::new()
                .hash_threshold(16)
                .rename_policy(RenamePolicy::ContentOnly),
        );
        harness.write("video.mp4", vec![1u8; 100]);
        harness.write("note.txt", "short");
        harness.run().unwrap();

        harness.rename("video.mp4", "archive.mp4");
        harness.rename("note.txt", "memo.txt");

        let result = harness.run().unwrap().result;
        assert_eq!(result.renamed.len(), 1);
        assert_eq!(result.renamed[0].to, "memo.txt");
        assert_eq!(paths(&result.added), vec!["archive.mp4"]);
        assert_eq!(paths(&result.deleted), vec!["video.mp4"]);
    }

    #[test]
    fn test_multi_candidate_rename() {
        let harness = SnapdiffTestHarness::new();
        for name in ["copy_a.txt", "copy_b.txt", "copy_c.txt"] {
            harness.write(name, "identical");
        }
        harness.run().unwrap();

        for name in ["copy_a.txt", "copy_b.txt", "copy_c.txt"] {
            harness.remove(name);
        }
        harness.write("merged.txt", "identical");

        let result = harness.run().unwrap().result;
        assert_eq!(result.renamed.len(), 1);
        assert_eq!(result.renamed[0].from, "copy_a.txt");
        assert_eq!(result.renamed[0].to, "merged.txt");
        assert_eq!(paths(&result.deleted), vec!["copy_b.txt", "copy_c.txt"]);
        assert!(result.added.is_empty());
    }

    #[test]
    fn test_failing_reporter_leaves_snapshot_file_untouched() {
        let harness = SnapdiffTestHarness::new();
        harness.write("a.txt", "one");
        harness.run().unwrap();
        let before = harness.snapshot_bytes();

        harness.write("b.txt", "two");
        let mut failing = |_: &DiffResult| Err::<(), _>(SnapdiffError::reporter("webhook timed out"));
        let err = harness.run_with(&mut failing).unwrap_err();
        assert!(matches!(err, SnapdiffError::Reporter(_)));
        assert_eq!(harness.snapshot_bytes(), before);

        let retry = harness.run().unwrap();
        assert_eq!(paths(&retry.result.added), vec!["b.txt"]);
    }

    #[test]
    fn test_failing_save_leaves_previous_snapshot() {
        let root = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "one").unwrap();

        let store = FlakyStore {
            inner: FileSnapshotStore::open(store_dir.path()).unwrap(),
            fail_saves: std::cell::Cell::new(false),
        };
        let detector = DetectorBuilder::new().build(root.path().to_path_buf(), store).unwrap();
        let scanner = Scanner::new(root.path().to_path_buf());

        detector.run(&scanner.scan().unwrap(), &mut NoOpReporter, None).unwrap();
        let before = fs::read(detector.store().inner.snapshot_path()).unwrap();

        fs::write(root.path().join("a.txt"), "one, edited").unwrap();
        detector.store().fail_saves.set(true);
        let err = detector
            .run(&scanner.scan().unwrap(), &mut NoOpReporter, None)
            .unwrap_err();
        assert!(matches!(err, SnapdiffError::SnapshotPersist(_)));
        assert_eq!(fs::read(detector.store().inner.snapshot_path()).unwrap(), before);

        detector.store().fail_saves.set(false);
        let retry = detector.run(&scanner.scan().unwrap(), &mut NoOpReporter, None).unwrap();
        assert_eq!(retry.result.modified.len(), 1);
    }

    #[test]
    fn test_preview_matches_run_and_does_not_rotate() {
        let harness = SnapdiffTestHarness::new();
        harness.write("a.txt", "one");
        harness.run().unwrap();
        let before = harness.snapshot_bytes();

        harness.write("a.txt", "uno");
        let preview = harness.preview().unwrap();
        assert_eq!(harness.snapshot_bytes(), before);

        let run = harness.run().unwrap();
        assert_eq!(preview, run.result);
    }

    #[test]
    fn test_scanner_ignore_rules() {
        let mut harness = SnapdiffTestHarness::new();
        harness.scanner = Scanner::new(harness.root().to_path_buf()).with_ignore_patterns(vec!["*.tmp".to_string()]);
        harness.write(".gitignore", "target/\n");
        harness.write("target/debug/app", "binary");
        harness.write("scratch.tmp", "tmp");
        harness.write("src/main.rs", "fn main() {}");

        let result = harness.run().unwrap().result;
        assert_eq!(paths(&result.added), vec![".gitignore", "src/main.rs"]);
    }

    #[test]
    fn test_many_files() {
        let harness = SnapdiffTestHarness::new();
        for i in 0..300 {
            harness.write(&format!("dir_{}/file_{:03}.txt", i % 7, i), format!("Content {}", i));
        }
        let first = harness.run().unwrap();
        assert_eq!(first.files_scanned, 300);

        for i in (0..300).step_by(10) {
            harness.write(&format!("dir_{}/file_{:03}.txt", i % 7, i), format!("Changed {}", i));
        }
        let second = harness.run().unwrap();
        assert_eq!(second.result.modified.len(), 30);
        assert!(second.result.added.is_empty());
        assert!(second.result.deleted.is_empty());

        let sorted = second
            .result
            .modified
            .windows(2)
            .all(|w| w[0].rel_path < w[1].rel_path);
        assert!(sorted);
    }

    #[test]
    fn test_run_lock_serializes_runs() {
        let harness = SnapdiffTestHarness::new();
        let lock = RunLock::acquire(harness.store_dir.path()).unwrap();
        let err = RunLock::acquire(harness.store_dir.path()).unwrap_err();
        assert!(err.is_precondition());
        drop(lock);
        assert!(RunLock::acquire(harness.store_dir.path()).is_ok());
    }
}
