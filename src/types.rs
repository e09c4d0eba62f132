//! Core data types used throughout the snapdiff library
//!
//! ## Overview
//!
//! - **File state**: [`FileRecord`], [`Fingerprint`] - one tracked file and the
//!   value that identifies its content (or, failing that, its metadata)
//! - **Traversal input**: [`ScanEntry`] - what the directory walker hands to the
//!   fingerprint generator
//! - **Results**: [`DiffResult`], [`ModifiedEntry`], [`RenamedEntry`],
//!   [`ChangeStats`] - the four-way classification of a run
//! - **Progress**: [`ProgressInfo`] - passed to progress callbacks
//!
//! ## Examples
//!
//! ```rust
//! use snapdiff::types::{Fingerprint, FingerprintKind};
//! use chrono::{TimeZone, Utc};
//!
//! let modified = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let fp = Fingerprint::Metadata { size: 42, modified };
//!
//! assert_eq!(fp.kind(), FingerprintKind::Metadata);
//! assert_eq!(fp.to_string(), "META:42:2024-05-01T12:00:00.000000000Z");
//! assert_eq!(fp.to_string().parse::<Fingerprint>().unwrap(), fp);
//! ```

use crate::error::{Result, SnapdiffError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix of the metadata-fallback fingerprint tag
pub const METADATA_TAG: &str = "META";

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Format a timestamp the way snapshots persist it
///
/// RFC 3339 in UTC with nanosecond precision and a `Z` suffix, so that the
/// string form round-trips without loss.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a persisted RFC 3339 timestamp into UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// How a fingerprint was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintKind {
    /// SHA-256 over the full file content
    Content,
    /// Size and last-write time only; content was not read
    Metadata,
}

/// Value identifying a file's state
///
/// A `Content` fingerprint is a true content identity. A `Metadata`
/// fingerprint is used when the file is over the hashing threshold or could
/// not be read: two different files with the same size and mtime collide,
/// and a rewrite that preserves both is invisible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fingerprint {
    /// Lowercase hex SHA-256 digest
    Content(String),
    /// Size + last-write tag, rendered as `META:<bytes>:<timestamp>`
    Metadata {
        /// Exact byte length
        size: u64,
        /// Last-write time in UTC
        modified: DateTime<Utc>,
    },
}

impl Fingerprint {
    /// Provenance of this fingerprint
    pub fn kind(&self) -> FingerprintKind {
        match self {
            Fingerprint::Content(_) => FingerprintKind::Content,
            Fingerprint::Metadata { .. } => FingerprintKind::Metadata,
        }
    }

    /// Whether this is a metadata-fallback fingerprint
    pub fn is_metadata(&self) -> bool {
        matches!(self, Fingerprint::Metadata { .. })
    }

    /// Short display form for logs and reports
    pub fn short(&self) -> String {
        match self {
            Fingerprint::Content(hex) => hex.chars().take(12).collect(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Content(hex) => f.write_str(hex),
            Fingerprint::Metadata { size, modified } => {
                write!(f, "{}:{}:{}", METADATA_TAG, size, format_timestamp(modified))
            }
        }
    }
}

impl FromStr for Fingerprint {
    type Err = SnapdiffError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s
            .strip_prefix(METADATA_TAG)
            .and_then(|rest| rest.strip_prefix(':'))
        {
            let (size, ts) = rest
                .split_once(':')
                .ok_or_else(|| SnapdiffError::InvalidFingerprint(s.to_string()))?;
            let size = size
                .parse::<u64>()
                .map_err(|_| SnapdiffError::InvalidFingerprint(s.to_string()))?;
            let modified =
                parse_timestamp(ts).ok_or_else(|| SnapdiffError::InvalidFingerprint(s.to_string()))?;
            return Ok(Fingerprint::Metadata { size, modified });
        }

        if s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            // Digests written by other tools may be upper-case
            return Ok(Fingerprint::Content(s.to_ascii_lowercase()));
        }

        Err(SnapdiffError::InvalidFingerprint(s.to_string()))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One tracked file in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the scan root, `/`-separated; unique within a snapshot
    pub rel_path: String,
    /// File size in bytes
    pub size: u64,
    /// Last-write time in UTC
    pub modified: DateTime<Utc>,
    /// Content digest or metadata tag
    pub fingerprint: Fingerprint,
}

/// A file as reported by the traversal collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last-write time in UTC
    pub modified: DateTime<Utc>,
}

/// A path present in both snapshots whose fingerprint changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedEntry {
    /// Relative path (same on both sides)
    pub rel_path: String,
    /// Fingerprint in the previous snapshot
    pub old_fingerprint: Fingerprint,
    /// Fingerprint in the new snapshot
    pub new_fingerprint: Fingerprint,
    /// Size in the previous snapshot
    pub old_size: u64,
    /// Size in the new snapshot
    pub new_size: u64,
    /// Last-write time in the previous snapshot
    pub old_modified: DateTime<Utc>,
    /// Last-write time in the new snapshot
    pub new_modified: DateTime<Utc>,
}

impl ModifiedEntry {
    /// Build a modification record from the two sides of a path
    pub fn between(old: &FileRecord, new: &FileRecord) -> Self {
        Self {
            rel_path: new.rel_path.clone(),
            old_fingerprint: old.fingerprint.clone(),
            new_fingerprint: new.fingerprint.clone(),
            old_size: old.size,
            new_size: new.size,
            old_modified: old.modified,
            new_modified: new.modified,
        }
    }

    /// Signed size change
    pub fn size_delta(&self) -> i64 {
        self.new_size as i64 - self.old_size as i64
    }
}

/// A deleted path and an added path paired by a shared fingerprint
///
/// Pairing is best-effort: when several candidates share a fingerprint the
/// pairing carries no file-identity provenance. Check
/// `fingerprint.kind()` to see whether the match rests on content or on a
/// size/mtime coincidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedEntry {
    /// Path in the previous snapshot
    pub from: String,
    /// Path in the new snapshot
    pub to: String,
    /// Fingerprint shared by both sides
    pub fingerprint: Fingerprint,
}

/// Final four-way classification of a run
///
/// All lists are sorted ascending by relative path (renames by `from`, then
/// `to`). Unchanged paths appear in none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Paths only in the new snapshot
    pub added: Vec<FileRecord>,
    /// Paths in both snapshots with differing fingerprints
    pub modified: Vec<ModifiedEntry>,
    /// Paths only in the previous snapshot
    pub deleted: Vec<FileRecord>,
    /// Deleted/added pairs sharing a fingerprint
    pub renamed: Vec<RenamedEntry>,
}

impl DiffResult {
    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.renamed.is_empty()
    }

    /// Derived counts for reporting
    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            files_added: self.added.len(),
            files_modified: self.modified.len(),
            files_deleted: self.deleted.len(),
            files_renamed: self.renamed.len(),
            bytes_added: self.added.iter().map(|r| r.size).sum(),
            bytes_modified: self.modified.iter().map(|m| m.new_size).sum(),
            bytes_deleted: self.deleted.iter().map(|r| r.size).sum(),
            modified_size_delta: self.modified.iter().map(ModifiedEntry::size_delta).sum(),
        }
    }
}

/// Statistics about changes between two snapshots
///
/// # Examples
///
/// ```rust
/// # use snapdiff::types::ChangeStats;
/// let stats = ChangeStats {
///     files_added: 10,
///     files_modified: 5,
///     files_deleted: 2,
///     files_renamed: 1,
///     bytes_added: 50000,
///     bytes_modified: 10000,
///     bytes_deleted: 5000,
///     modified_size_delta: -1000,
/// };
///
/// assert_eq!(stats.total_operations(), 18);
/// assert_eq!(stats.net_size_change(), 44000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Number of files added
    pub files_added: usize,
    /// Number of files modified
    pub files_modified: usize,
    /// Number of files deleted
    pub files_deleted: usize,
    /// Number of rename pairs
    pub files_renamed: usize,
    /// Total size of added files
    pub bytes_added: u64,
    /// Total size of modified files (new size)
    pub bytes_modified: u64,
    /// Total size of deleted files
    pub bytes_deleted: u64,
    /// Sum of (new size - old size) over modified files
    pub modified_size_delta: i64,
}

impl ChangeStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total_operations() > 0
    }

    /// Get total number of classified paths (a rename counts once)
    pub fn total_operations(&self) -> usize {
        self.files_added + self.files_modified + self.files_deleted + self.files_renamed
    }

    /// Get net size change in bytes
    ///
    /// Renames do not change the total size.
    pub fn net_size_change(&self) -> i64 {
        self.bytes_added as i64 - self.bytes_deleted as i64 + self.modified_size_delta
    }
}

/// Progress callback for long-running operations
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Information passed to progress callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Items processed so far
    pub processed: usize,
    /// Total items to process (if known)
    pub total: Option<usize>,
    /// Bytes processed so far
    pub bytes_processed: u64,
    /// Total bytes to process (if known)
    pub total_bytes: Option<u64>,
}

impl ProgressInfo {
    /// Get progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.processed as f32 / total as f32) * 100.0),
            _ => None,
        }
    }
}
