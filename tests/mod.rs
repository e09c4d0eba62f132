//! Main test module for snapdiff
//!
//! This module includes all test suites:
//! - Integration tests driving real directories through several runs
//! - Property-based tests for diff and persistence invariants
//! - Edge cases around odd file names and stored snapshot contents

pub mod integration;

#[cfg(test)]
mod edge_cases {
    use crate::integration::SnapdiffTestHarness;
    use ::snapdiff::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_directory() {
        let harness = SnapdiffTestHarness::new();

        let first = harness.run().unwrap();
        assert!(first.bootstrap);
        assert_eq!(first.files_scanned, 0);
        assert!(first.result.is_empty());

        harness.write("file.txt", "content");
        let second = harness.run().unwrap();
        // An empty previous snapshot still counts as a bootstrap
        assert!(second.bootstrap);
        assert_eq!(second.result.added.len(), 1);
    }

    #[test]
    fn test_special_filenames() {
        let harness = SnapdiffTestHarness::new();

        let special_names = vec![
            "file with spaces.txt",
            "file,with,commas.txt",
            "file\"with\"quotes.txt",
            "file@with#special$chars.txt",
            "file(with)parens.txt",
            "file[with]brackets.txt",
            "file{with}braces.txt",
        ];

        let mut created = Vec::new();
        for name in &special_names {
            // Skip names the OS rejects
            if fs::write(harness.root().join(name), format!("Content of {}", name)).is_ok() {
                created.push(name.to_string());
            }
        }

        let first = harness.run().unwrap();
        assert_eq!(first.result.added.len(), created.len());

        // The stored CSV reloads every odd name exactly
        let stored = harness.store().load().unwrap();
        for name in &created {
            assert!(stored.contains(name), "missing {name:?} after reload");
        }

        let second = harness.run().unwrap();
        assert!(second.result.is_empty());
    }

    #[test]
    fn test_unicode_filenames() {
        let harness = SnapdiffTestHarness::new();

        let unicode_names = vec![
            "файл.txt",     // Russian
            "文件.txt",     // Chinese
            "ファイル.txt", // Japanese
            "αρχείο.txt",   // Greek
            "🚀🌟💾.txt",   // Emojis
        ];

        let mut created = Vec::new();
        for name in &unicode_names {
            if fs::write(harness.root().join(name), format!("Unicode content: {}", name)).is_ok() {
                created.push(*name);
            }
        }
        if created.is_empty() {
            return;
        }

        harness.run().unwrap();
        fs::rename(harness.root().join(created[0]), harness.root().join("renamed.txt")).unwrap();

        let result = harness.run().unwrap().result;
        assert_eq!(result.renamed.len(), 1);
        assert_eq!(result.renamed[0].from, created[0]);
        assert_eq!(result.renamed[0].to, "renamed.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_filenames_do_not_abort_runs() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let harness = SnapdiffTestHarness::new();
        harness.write("plain.txt", "p");
        for name in [b"a\xff".as_slice(), b"a\xfe".as_slice()] {
            let _ = fs::write(harness.root().join(OsStr::from_bytes(name)), "same bytes");
        }

        let first = harness.run().unwrap();
        assert_eq!(first.files_scanned, 1);
        assert_eq!(first.result.added[0].rel_path, "plain.txt");

        let second = harness.run().unwrap();
        assert!(second.result.is_empty());
    }

    #[test]
    fn test_nested_paths_use_forward_slashes() {
        let harness = SnapdiffTestHarness::new();
        harness.write("a/b/c/deep.txt", "deep");

        let result = harness.run().unwrap().result;
        assert_eq!(result.added[0].rel_path, "a/b/c/deep.txt");
    }

    #[test]
    fn test_foreign_schema_is_a_fresh_bootstrap() {
        let harness = SnapdiffTestHarness::new();
        harness.write("kept.txt", "x");
        harness.run().unwrap();

        fs::write(harness.store().snapshot_path(), "Path;Hash\nkept.txt;abc\n").unwrap();

        let summary = harness.run().unwrap();
        assert!(summary.bootstrap);
        assert_eq!(summary.result.added.len(), 1);
    }

    #[test]
    fn test_corrupt_snapshot_fails_without_overwriting() {
        let harness = SnapdiffTestHarness::new();
        harness.write("kept.txt", "x");
        harness.run().unwrap();

        let corrupt = "RelPath,SizeBytes,LastWriteUtc,Fingerprint\n\"kept.txt\",\"1\",\"yesterday\",\"META:1:2024-01-01T00:00:00Z\"\n";
        fs::write(harness.store().snapshot_path(), corrupt).unwrap();

        let err = harness.run().unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(fs::read_to_string(harness.store().snapshot_path()).unwrap(), corrupt);
    }

    #[test]
    fn test_missing_store_dir_is_a_precondition_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileSnapshotStore::open(temp_dir.path().join("absent")).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_root_removed_between_runs() {
        let root = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let watched = root.path().join("watched");
        fs::create_dir(&watched).unwrap();

        let store = FileSnapshotStore::open(store_dir.path()).unwrap();
        let detector = DetectorBuilder::new().build(watched.clone(), store).unwrap();
        fs::remove_dir(&watched).unwrap();

        let err = detector.run(&[], &mut NoOpReporter, None).unwrap_err();
        assert!(matches!(err, SnapdiffError::RootNotFound(_)));
        assert!(!detector.store().has_snapshot());
    }
}

// Re-export test utilities for use in other suites
pub use integration::SnapdiffTestHarness;
