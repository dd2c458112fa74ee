//! Mutual exclusion over a named resource.
//!
//! One poll cycle runs per repository at a time. The daemon and ad hoc
//! `run-once` invocations coordinate through [`FileLockManager`], which takes
//! a blocking `flock`-style exclusive lock on a zero-content marker file.
//! There is no timeout: a stuck holder blocks every other process until it
//! exits.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

/// Lock acquisition errors.
#[derive(Error, Debug)]
pub enum LockError {
    /// The marker file could not be created or opened.
    #[error("cannot open lock file {path}: {source}")]
    Open {
        /// Marker file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The OS refused the exclusive lock.
    #[error("cannot lock {path}: {source}")]
    Acquire {
        /// Marker file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An in-process lock table was poisoned by a panicking holder.
    #[error("lock table poisoned")]
    Poisoned,
}

/// A held lock. The resource is released when the handle is dropped.
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle<'a> {
    _held: Box<dyn Send + 'a>,
}

impl<'a> LockHandle<'a> {
    fn new(held: impl Send + 'a) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

/// Exclusive access to a named resource, shared by every cooperating caller.
pub trait LockManager {
    /// Blocks until the resource is exclusively held by the caller.
    fn acquire(&self, resource: &str) -> Result<LockHandle<'_>, LockError>;
}

/// Cross-process lock backed by advisory file locks.
#[derive(Debug, Clone)]
pub struct FileLockManager {
    dir: PathBuf,
}

impl FileLockManager {
    /// Creates a manager that keeps its marker files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the marker file used for `resource`.
    pub fn lock_path(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{resource}.lock"))
    }
}

struct FileLock {
    file: File,
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), "Explicit unlock failed, closing file instead: {e}");
        }
    }
}

fn open_marker(path: &Path) -> Result<File, LockError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })
}

impl LockManager for FileLockManager {
    fn acquire(&self, resource: &str) -> Result<LockHandle<'_>, LockError> {
        let path = self.lock_path(resource);
        let file = open_marker(&path)?;
        debug!(path = %path.display(), "Waiting for exclusive lock");
        file.lock_exclusive().map_err(|source| LockError::Acquire {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Exclusive lock acquired");
        Ok(LockHandle::new(FileLock { file, path }))
    }
}

/// In-process lock keyed by resource name.
///
/// Gives the same blocking semantics as [`FileLockManager`] between threads
/// sharing one manager, without touching the file system.
#[derive(Debug, Default)]
pub struct InProcessLockManager {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl InProcessLockManager {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `resource` is currently held.
    pub fn is_held(&self, resource: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(resource))
            .unwrap_or(false)
    }
}

struct MemoryLock<'a> {
    manager: &'a InProcessLockManager,
    resource: String,
}

impl Drop for MemoryLock<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.manager.held.lock() {
            held.remove(&self.resource);
        }
        self.manager.released.notify_all();
    }
}

impl LockManager for InProcessLockManager {
    fn acquire(&self, resource: &str) -> Result<LockHandle<'_>, LockError> {
        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;
        while held.contains(resource) {
            held = self
                .released
                .wait(held)
                .map_err(|_| LockError::Poisoned)?;
        }
        held.insert(resource.to_string());
        Ok(LockHandle::new(MemoryLock {
            manager: self,
            resource: resource.to_string(),
        }))
    }
}
