//! Snapshot comparison
//!
//! Compares a previous and a new [`Snapshot`] path by path. A path only in
//! the new snapshot is added, a path only in the previous one is deleted, and
//! a path in both is modified when the fingerprints differ. Equal
//! fingerprints mean unchanged and produce nothing.
//!
//! Both snapshots iterate in ascending path order, so the comparison is a
//! single merge walk: linear in `|previous| + |new|`, and every output list
//! comes out already sorted.
//!
//! ```rust
//! use snapdiff::diff::{compare, diff_snapshots};
//! use snapdiff::rename::RenamePolicy;
//! use snapdiff::{FileRecord, Fingerprint, Snapshot};
//! use chrono::Utc;
//!
//! # fn main() -> snapdiff::Result<()> {
//! let fp = Fingerprint::Content("ab".repeat(32));
//! let rec = |path: &str| FileRecord {
//!     rel_path: path.to_string(),
//!     size: 3,
//!     modified: Utc::now(),
//!     fingerprint: fp.clone(),
//! };
//! let previous = Snapshot::from_records(vec![rec("a.txt")])?;
//! let new = Snapshot::from_records(vec![rec("b.txt")])?;
//!
//! let raw = diff_snapshots(&previous, &new);
//! assert_eq!(raw.added.len(), 1);
//! assert_eq!(raw.deleted.len(), 1);
//!
//! let result = compare(&previous, &new, RenamePolicy::default());
//! assert_eq!(result.renamed.len(), 1);
//! assert!(result.added.is_empty() && result.deleted.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::rename::{resolve_renames, RenamePolicy};
use crate::snapshot::Snapshot;
use crate::types::{DiffResult, FileRecord, ModifiedEntry};
use std::cmp::Ordering;

/// Added/modified/deleted lists before rename resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDiff {
    /// Paths only in the new snapshot, ascending
    pub added: Vec<FileRecord>,
    /// Paths in both with differing fingerprints, ascending
    pub modified: Vec<ModifiedEntry>,
    /// Paths only in the previous snapshot, ascending
    pub deleted: Vec<FileRecord>,
}

/// Compare two snapshots without rename resolution
pub fn diff_snapshots(previous: &Snapshot, new: &Snapshot) -> RawDiff {
    let mut raw = RawDiff::default();
    let mut old_iter = previous.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        let order = match (old_iter.peek(), new_iter.peek()) {
            (Some(old), Some(new)) => old.rel_path.cmp(&new.rel_path),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };

        match order {
            Ordering::Less => {
                if let Some(old) = old_iter.next() {
                    raw.deleted.push(old.clone());
                }
            }
            Ordering::Greater => {
                if let Some(new) = new_iter.next() {
                    raw.added.push(new.clone());
                }
            }
            Ordering::Equal => {
                if let (Some(old), Some(new)) = (old_iter.next(), new_iter.next()) {
                    if old.fingerprint != new.fingerprint {
                        raw.modified.push(ModifiedEntry::between(old, new));
                    }
                }
            }
        }
    }

    raw
}

/// Compare two snapshots and pair renames
///
/// Runs [`diff_snapshots`] and then [`resolve_renames`] on the added and
/// deleted lists. Both steps are pure; neither snapshot is modified.
pub fn compare(previous: &Snapshot, new: &Snapshot, policy: RenamePolicy) -> DiffResult {
    let raw = diff_snapshots(previous, new);
    let resolved = resolve_renames(&raw.added, &raw.deleted, policy);

    DiffResult {
        added: resolved.added,
        modified: raw.modified,
        deleted: resolved.deleted,
        renamed: resolved.renamed,
    }
}
