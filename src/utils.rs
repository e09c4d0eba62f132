//! Utility functions for snapdiff
//!
//! File hashing, metadata extraction, relative-path handling, atomic writes
//! and byte formatting. All functions are thread-safe and can be called
//! concurrently from the fingerprinting workers.

use crate::error::{Result, SnapdiffError};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

/// Hash a file's content using SHA-256
///
/// Streams the file through an 8KB buffer, so memory use is flat regardless
/// of file size.
///
/// # Returns
///
/// The digest as a 64-character lowercase hexadecimal string.
///
/// # Errors
///
/// - [`SnapdiffError::Io`] if the file cannot be opened or read
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary data using SHA-256
#[cfg(test)]
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File metadata container
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Last modification timestamp in UTC
    pub modified: DateTime<Utc>,
}

/// Get file metadata without following symbolic links
pub fn get_file_metadata(path: &Path) -> Result<FileMetadata> {
    let metadata = fs::symlink_metadata(path)?;

    Ok(FileMetadata {
        size: metadata.len(),
        modified: metadata.modified()?.into(),
    })
}

/// Make a path relative to a base path
///
/// Tries a lexical strip first so symbolic links keep their own path, then
/// falls back to canonicalising both sides.
///
/// # Errors
///
/// - [`SnapdiffError::PathOutsideRoot`] if the path is not under the base path
pub fn make_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Ok(relative.to_path_buf());
    }

    let outside = || SnapdiffError::PathOutsideRoot {
        path: path.to_path_buf(),
        root: base.to_path_buf(),
    };
    let path_canon = path.canonicalize().map_err(|_| outside())?;
    let base_canon = base.canonicalize().map_err(|_| outside())?;

    path_canon
        .strip_prefix(&base_canon)
        .map(Path::to_path_buf)
        .map_err(|_| outside())
}

/// Render a relative path as a snapshot key
///
/// Components are joined with `/` on every platform. Returns `None` for an
/// empty path or one that escapes its base (`..`, root or prefix components).
pub fn rel_path_key(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Atomic file write (write to temp file, fsync, then rename)
///
/// The temporary file is created in the target's directory so the final
/// rename never crosses filesystems. On any failure the temporary file is
/// removed and an existing target is left untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    trace!("Atomically wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Format bytes in human-readable form (binary units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
