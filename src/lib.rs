//! # snapdiff - Snapshot-based change detection for directory trees
//!
//! Each run fingerprints every file under a root, compares the result with
//! the snapshot saved by the previous run, and classifies every path as
//! added, modified, deleted or renamed. The new snapshot then becomes the
//! baseline for the next run.
//!
//! ## Overview
//!
//! - **Fingerprints**: files up to a size threshold (10 MiB by default) get a
//!   SHA-256 content digest; larger or unreadable files get a tag built from
//!   their size and last-write time
//! - **Snapshots**: path-ordered collections of file records, persisted as a
//!   small CSV file with atomic replacement
//! - **Diff engine**: a single merge walk over two snapshots
//! - **Rename inference**: deletions and additions that share a fingerprint
//!   are paired as renames
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapdiff::{DetectorBuilder, FileSnapshotStore, JsonReporter, Scanner};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = PathBuf::from("./my_project");
//! let store = FileSnapshotStore::create("./.snapdiff")?;
//! let detector = DetectorBuilder::new().build(root.clone(), store)?;
//!
//! let entries = Scanner::new(root)
//!     .with_exclude_dir(PathBuf::from("./.snapdiff"))
//!     .scan()?;
//!
//! let mut reporter = JsonReporter::new(std::io::stdout());
//! let summary = detector.run(&entries, &mut reporter, None)?;
//! if summary.bootstrap {
//!     println!("First run: {} files recorded", summary.files_scanned);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Comparing snapshots directly
//!
//! The diff engine and rename resolver are pure functions and can be used
//! without a store:
//!
//! ```rust
//! use snapdiff::{compare, FileRecord, Fingerprint, RenamePolicy, Snapshot};
//! use chrono::Utc;
//!
//! # fn main() -> snapdiff::Result<()> {
//! let record = |path: &str, digest: &str| FileRecord {
//!     rel_path: path.to_string(),
//!     size: 10,
//!     modified: Utc::now(),
//!     fingerprint: Fingerprint::Content(digest.repeat(32)),
//! };
//!
//! let previous = Snapshot::from_records(vec![record("a.txt", "01"), record("x.txt", "02")])?;
//! let current = Snapshot::from_records(vec![record("b.txt", "01"), record("x.txt", "03")])?;
//!
//! let result = compare(&previous, &current, RenamePolicy::default());
//! assert_eq!(result.renamed[0].from, "a.txt");
//! assert_eq!(result.modified[0].rel_path, "x.txt");
//! # Ok(())
//! # }
//! ```
//!
//! ## Caveats
//!
//! A metadata fingerprint is not a content fingerprint. Two different large
//! files with the same size and last-write time are indistinguishable, and a
//! rewrite that preserves both is invisible. Renames paired on such
//! fingerprints, or inside a group with several candidates, are best-effort;
//! see [`rename`].
//!
//! ## Thread Safety
//!
//! Fingerprinting runs on a bounded worker pool. A [`ChangeDetector`] run is
//! a single non-reentrant transaction; use [`RunLock`] to keep separate
//! processes from running against the same store at once.

// Public API modules
pub mod detector;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod rename;
pub mod report;
pub mod scan;
pub mod snapshot;
pub mod store;
pub mod types;

// Internal modules (not part of public API)
mod collections;
mod utils;

// Re-export main types for convenience
pub use detector::{ChangeDetector, DetectorBuilder, DetectorConfig, RunSummary};
pub use diff::compare;
pub use error::{Result, SnapdiffError};
pub use fingerprint::{FingerprintGenerator, DEFAULT_HASH_THRESHOLD};
pub use rename::RenamePolicy;
pub use report::{ChangeReporter, JsonReporter, NoOpReporter};
pub use scan::Scanner;
pub use snapshot::Snapshot;
pub use store::{FileSnapshotStore, MemorySnapshotStore, RunLock, SnapshotStore};
pub use types::*;
pub use utils::format_bytes;
