//! Snapshot persistence
//!
//! A [`SnapshotStore`] holds the single "previous" snapshot between runs.
//! Loading when nothing has been saved yet returns an empty snapshot, which
//! is how a bootstrap run starts. Saving replaces the stored snapshot; a
//! failed save leaves the previous one readable.
//!
//! [`FileSnapshotStore`] keeps the snapshot as `snapshot.csv` inside a store
//! directory and replaces it with a write-to-temp, fsync, rename sequence.
//! [`MemorySnapshotStore`] keeps it in memory for tests and embedding.

use crate::error::{Result, SnapdiffError};
use crate::snapshot::Snapshot;
use crate::utils;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the persisted snapshot inside a store directory
pub const SNAPSHOT_FILE: &str = "snapshot.csv";

/// File name of the run lock inside a store directory
pub const LOCK_FILE: &str = "snapshot.lock";

/// Persistence for the previous snapshot
pub trait SnapshotStore {
    /// Load the stored snapshot, or an empty one if none has been saved
    fn load(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    fn load(&self) -> Result<Snapshot> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        (**self).save(snapshot)
    }
}

/// Snapshot stored as CSV in a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store in an existing directory
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::StoreNotFound`] if `dir` is missing or not a directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(SnapdiffError::StoreNotFound(dir));
        }
        debug!("Opened snapshot store at {:?}", dir);
        Ok(Self { dir })
    }

    /// Create the directory if needed, then open it
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created snapshot store at {:?}", dir);
        }
        Self::open(dir)
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the persisted snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Whether a snapshot has been saved
    pub fn has_snapshot(&self) -> bool {
        self.snapshot_path().is_file()
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Snapshot> {
        if !self.dir.is_dir() {
            return Err(SnapdiffError::StoreNotFound(self.dir.clone()));
        }

        let path = self.snapshot_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No previous snapshot at {:?}, starting from empty", path);
                return Ok(Snapshot::empty());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(SnapdiffError::corrupt(0, format!("{:?} is not valid UTF-8", path)));
            }
            Err(e) => return Err(e.into()),
        };

        match Snapshot::from_csv(&text)? {
            Some(snapshot) => {
                debug!("Loaded {} records from {:?}", snapshot.len(), path);
                Ok(snapshot)
            }
            None => {
                warn!(
                    "Snapshot {:?} has an unrecognised header, treating this run as a bootstrap",
                    path
                );
                Ok(Snapshot::empty())
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(SnapdiffError::StoreNotFound(self.dir.clone()));
        }

        let path = self.snapshot_path();
        let csv = snapshot.to_csv();
        utils::atomic_write(&path, csv.as_bytes()).map_err(|e| match e {
            SnapdiffError::SnapshotPersist(_) => e,
            other => SnapdiffError::SnapshotPersist(other.to_string()),
        })?;

        debug!("Saved {} records ({} bytes) to {:?}", snapshot.len(), csv.len(), path);
        Ok(())
    }
}

/// In-memory snapshot store
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Currently stored snapshot, if any has been saved
    pub fn current(&self) -> Option<Snapshot> {
        self.snapshot.lock().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot.lock().clone().unwrap_or_default())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// Exclusive marker that one process is running against a store
///
/// Advisory only: a lock file left behind by a crashed process must be
/// removed by hand.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock for `store_dir`
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::LockHeld`] if the lock file already exists
    /// - [`SnapdiffError::StoreNotFound`] if the directory is missing
    pub fn acquire(store_dir: &Path) -> Result<Self> {
        Self::acquire_with(store_dir, |file| writeln!(file, "{}", std::process::id()))
    }

    fn acquire_with<F>(store_dir: &Path, write_owner: F) -> Result<Self>
    where
        F: FnOnce(&mut fs::File) -> std::io::Result<()>,
    {
        if !store_dir.is_dir() {
            return Err(SnapdiffError::StoreNotFound(store_dir.to_path_buf()));
        }

        let path = store_dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(SnapdiffError::LockHeld(path)),
            Err(e) => return Err(e.into()),
        };
        // Held from here on, so a failed write still releases the file
        let lock = Self { path };
        write_owner(&mut file)?;

        debug!("Acquired run lock {:?}", lock.path);
        Ok(lock)
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release run lock {:?}: {}", self.path, e);
        }
    }
}
