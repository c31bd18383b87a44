//! Directory Lock
//!
//! Advisory file lock claiming a directory for one owner.
//!
//! The lock is held on an open handle to `binstore.lck` inside the
//! directory. A second `DirectoryLock` on the same directory fails to
//! acquire it, whether it lives in another process or in this one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use fs2::FileExt;

use crate::error::{BinStoreError, Result};

/// Name of the lock file placed in a locked directory
pub const LOCK_FILE_NAME: &str = "binstore.lck";

/// A non-blocking, all-or-nothing claim on a directory
///
/// Created unlocked. Dropping a locked instance unlocks it and deletes the
/// lock file; the OS releases the advisory lock regardless, so only the
/// file cleanup depends on this.
#[derive(Debug)]
pub struct DirectoryLock {
    /// Directory to lock
    dir: PathBuf,

    /// Note written into the lock file once acquired
    text: String,

    /// Open lock file while the lock is held
    file: Option<File>,
}

impl DirectoryLock {
    pub fn new(dir: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            text: text.into(),
            file: None,
        }
    }

    /// Try to lock the directory
    ///
    /// Returns `Ok(false)` if someone else holds the lock.
    pub fn try_lock(&mut self) -> Result<bool> {
        if self.file.is_some() {
            return Ok(true);
        }

        let path = self.lock_path();
        let lock_error = |source: io::Error| BinStoreError::Lock {
            path: path.clone(),
            source,
        };

        // no truncation before the lock is ours, the note may belong to
        // the current owner
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Ok(false);
            }
            return Err(lock_error(e));
        }

        file.set_len(0).map_err(lock_error)?;
        writeln!(file, "{}", self.text).map_err(lock_error)?;
        file.flush().map_err(lock_error)?;

        self.file = Some(file);
        Ok(true)
    }

    /// Release the lock and delete the lock file
    ///
    /// Returns `Ok(false)` if this instance did not hold the lock.
    pub fn try_unlock(&mut self) -> Result<bool> {
        let Some(file) = self.file.take() else {
            return Ok(false);
        };

        let path = self.lock_path();
        let unlocked = FileExt::unlock(&file);
        drop(file);

        if let Err(e) = fs::remove_file(&path) {
            tracing::debug!("Unable to delete lock file {}: {}", path.display(), e);
        }

        unlocked.map_err(|source| BinStoreError::Lock { path, source })?;
        Ok(true)
    }

    pub fn is_locked(&self) -> bool {
        self.file.is_some()
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = self.try_unlock() {
            tracing::warn!("Error releasing lock on {}: {}", self.dir.display(), e);
        }
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
