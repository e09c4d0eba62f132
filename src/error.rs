//! Error types for the snapdiff library
//!
//! Every fallible operation in the crate returns [`Result`]. Per-file read
//! failures during fingerprinting never surface here: they are recovered by
//! the metadata fallback. What remains are precondition failures (missing
//! scan root or store), persisted-state problems, and persistence failures.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the snapdiff library
pub type Result<T> = std::result::Result<T, SnapdiffError>;

/// Main error type for all snapdiff operations
#[derive(Debug, Error)]
pub enum SnapdiffError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scan root is missing or not a directory
    #[error("Scan root not found or not a directory: {0:?}")]
    RootNotFound(PathBuf),

    /// Snapshot store directory is missing or not a directory
    #[error("Snapshot store not found or not a directory: {0:?}")]
    StoreNotFound(PathBuf),

    /// A traversal entry does not live under the scan root
    #[error("Path {path:?} is not under scan root {root:?}")]
    PathOutsideRoot {
        /// Offending entry path
        path: PathBuf,
        /// Configured scan root
        root: PathBuf,
    },

    /// Two records in one snapshot share a relative path
    #[error("Duplicate path in snapshot: {0}")]
    DuplicatePath(String),

    /// Persisted snapshot could not be parsed
    #[error("Corrupt snapshot at line {line}: {reason}")]
    CorruptSnapshot {
        /// 1-based line of the offending row, 0 when the file as a whole is unreadable
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Fingerprint string is neither a digest nor a metadata tag
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// New snapshot could not be durably written
    #[error("Failed to persist snapshot: {0}")]
    SnapshotPersist(String),

    /// Another run holds the store lock
    #[error("Snapshot store is locked by another run: {0:?}")]
    LockHeld(PathBuf),

    /// Reporter rejected the diff result
    #[error("Reporter failed: {0}")]
    Reporter(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Directory walk failed as a whole
    #[error("Walk error: {0}")]
    Walk(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rayon::ThreadPoolBuildError> for SnapdiffError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        SnapdiffError::ThreadPool(err.to_string())
    }
}

impl From<tempfile::PersistError> for SnapdiffError {
    fn from(err: tempfile::PersistError) -> Self {
        SnapdiffError::SnapshotPersist(err.error.to_string())
    }
}

impl SnapdiffError {
    /// Create a corrupt-snapshot error for a given line
    pub fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        SnapdiffError::CorruptSnapshot {
            line,
            reason: reason.into(),
        }
    }

    /// Create a reporter error with a custom message
    pub fn reporter(msg: impl Into<String>) -> Self {
        SnapdiffError::Reporter(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        SnapdiffError::Internal(msg.into())
    }

    /// Whether this error is a precondition failure raised before any
    /// snapshot work began
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SnapdiffError::RootNotFound(_)
                | SnapdiffError::StoreNotFound(_)
                | SnapdiffError::LockHeld(_)
                | SnapdiffError::InvalidConfiguration(_)
        )
    }

    /// Whether this error indicates damaged persisted state
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SnapdiffError::CorruptSnapshot { .. }
                | SnapdiffError::InvalidFingerprint(_)
                | SnapdiffError::DuplicatePath(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            SnapdiffError::RootNotFound(path) => {
                format!("Scan root {:?} does not exist or is not a directory. Check the --path argument.", path)
            }
            SnapdiffError::StoreNotFound(path) => {
                format!("Snapshot store {:?} does not exist. Create it or point --store at an existing directory.", path)
            }
            SnapdiffError::LockHeld(path) => {
                format!(
                    "Another snapdiff run is using this store. If no run is active, remove {:?} and retry.",
                    path
                )
            }
            SnapdiffError::CorruptSnapshot { line, reason } => {
                format!(
                    "The stored snapshot is damaged (line {}: {}). Delete it to start over with a bootstrap run.",
                    line, reason
                )
            }
            _ => self.to_string(),
        }
    }
}
