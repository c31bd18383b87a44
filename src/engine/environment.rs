//! Engine environment
//!
//! Wraps one opened LMDB environment. Every call runs in its own short
//! transaction, so nothing returned from here borrows engine memory.

use std::fmt;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use lmdb::{Cursor, DatabaseFlags, RwTransaction, Transaction, WriteFlags};
use lmdb_sys::{MDB_FIRST, MDB_NEXT, MDB_SET_RANGE};

use crate::error::{BinStoreError, Result};

use super::{key_fits, Database, EnvironmentTuning, OperationStatus, MAX_KEY_SIZE};

/// An opened LMDB environment bound to one directory
pub struct Environment {
    env: lmdb::Environment,
    path: PathBuf,

    /// Makes every probe report `MDB_PANIC`
    #[cfg(test)]
    poisoned: AtomicBool,
}

impl Environment {
    /// Open (creating files as needed) the environment in `path`
    ///
    /// The directory must already exist.
    pub fn open(path: &Path, tuning: &EnvironmentTuning) -> Result<Self> {
        let mut builder = lmdb::Environment::new();
        builder
            .set_flags(tuning.flags)
            .set_map_size(tuning.map_size)
            .set_max_dbs(tuning.max_dbs)
            .set_max_readers(tuning.max_readers);

        let env = builder
            .open(path)
            .map_err(|source| BinStoreError::OpenEnvironment {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            env,
            path: path.to_path_buf(),
            #[cfg(test)]
            poisoned: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cheap liveness check: begin and abort a read transaction
    pub fn probe(&self) -> std::result::Result<(), lmdb::Error> {
        #[cfg(test)]
        if self.poisoned.load(Ordering::Acquire) {
            return Err(lmdb::Error::Panic);
        }
        self.env.begin_ro_txn().map(|txn| txn.abort())
    }

    /// Make this environment report `MDB_PANIC` from now on
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
    }

    /// Whether a probe failure means the environment must be reopened
    ///
    /// `MDB_PANIC` leaves the environment unusable until it is closed and
    /// opened again; every other failure is reported to the caller.
    pub fn needs_reopen(error: &lmdb::Error) -> bool {
        matches!(error, lmdb::Error::Panic)
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// Open the named database, creating it if absent
    pub fn open_database(&self, name: &str) -> Result<Database> {
        let handle = self
            .env
            .create_db(Some(name), DatabaseFlags::empty())
            .map_err(|e| BinStoreError::engine("open database", e))?;
        Ok(Database::new(name, handle))
    }

    /// Remove the named database and everything in it, closing `db`
    ///
    /// LMDB shares one raw handle per name, so callers must make sure no
    /// other open `Database` refers to the same name.
    pub fn remove_database(&self, db: &Database) -> Result<()> {
        let Some(raw) = db.take() else {
            return Ok(());
        };

        let mut txn = self.begin_write()?;
        // SAFETY: `raw` was just taken out of its wrapper, so no further
        // engine call can be issued through it.
        unsafe { txn.drop_db(raw) }.map_err(|e| BinStoreError::engine("remove database", e))?;
        txn.commit()
            .map_err(|e| BinStoreError::engine("commit remove database", e))
    }

    /// Names of all named databases in the environment
    pub fn database_names(&self) -> Result<Vec<String>> {
        let main = self
            .env
            .open_db(None)
            .map_err(|e| BinStoreError::engine("open main database", e))?;
        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| BinStoreError::engine("begin read", e))?;
        let cursor = txn
            .open_ro_cursor(main)
            .map_err(|e| BinStoreError::engine("open cursor", e))?;

        let mut names = Vec::new();
        let mut op = MDB_FIRST;
        while let Some(key) = cursor_key(cursor.get(None, None, op), &[])? {
            names.push(String::from_utf8_lossy(key).into_owned());
            op = MDB_NEXT;
        }
        Ok(names)
    }

    // =========================================================================
    // Key/Value Operations
    // =========================================================================

    /// Get the value stored under `key`
    ///
    /// A key the engine cannot hold is never stored, so it is `NotFound`.
    pub fn get(&self, db: &Database, key: &[u8]) -> Result<(OperationStatus, Option<Vec<u8>>)> {
        let raw = db.raw()?;
        if !key_fits(key) {
            return Ok((OperationStatus::NotFound, None));
        }
        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| BinStoreError::engine("begin read", e))?;

        let result = match txn.get(raw, &key) {
            Ok(value) => (OperationStatus::Success, Some(value.to_vec())),
            Err(lmdb::Error::NotFound) => (OperationStatus::NotFound, None),
            Err(e) => return Err(BinStoreError::engine("get", e)),
        };
        Ok(result)
    }

    /// Put `value` under `key`, committing only on success
    pub fn put(&self, db: &Database, key: &[u8], value: &[u8]) -> Result<OperationStatus> {
        let raw = db.raw()?;
        if !key_fits(key) {
            return Err(BinStoreError::KeySize {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        let mut txn = self.begin_write()?;

        let status = status_of(txn.put(raw, &key, &value, WriteFlags::empty()), "put")?;
        if status == OperationStatus::Success {
            txn.commit()
                .map_err(|e| BinStoreError::engine("commit put", e))?;
        }
        Ok(status)
    }

    /// Delete `key`, committing only on success
    pub fn delete(&self, db: &Database, key: &[u8]) -> Result<OperationStatus> {
        let raw = db.raw()?;
        if !key_fits(key) {
            return Ok(OperationStatus::NotFound);
        }
        let mut txn = self.begin_write()?;

        let status = status_of(txn.del(raw, &key, None), "delete")?;
        if status == OperationStatus::Success {
            txn.commit()
                .map_err(|e| BinStoreError::engine("commit delete", e))?;
        }
        Ok(status)
    }

    /// Delete every entry one at a time through a write cursor
    ///
    /// Returns the number of entries removed.
    pub fn delete_all(&self, db: &Database) -> Result<usize> {
        let raw = db.raw()?;
        let mut txn = self.begin_write()?;
        let mut removed = 0;

        {
            let mut cursor = txn
                .open_rw_cursor(raw)
                .map_err(|e| BinStoreError::engine("open cursor", e))?;
            loop {
                match cursor.get(None, None, MDB_FIRST) {
                    Ok(_) => {
                        cursor
                            .del(WriteFlags::empty())
                            .map_err(|e| BinStoreError::engine("cursor delete", e))?;
                        removed += 1;
                    }
                    Err(lmdb::Error::NotFound) => break,
                    Err(e) => return Err(BinStoreError::engine("cursor get", e)),
                }
            }
        }

        txn.commit()
            .map_err(|e| BinStoreError::engine("commit delete all", e))?;
        Ok(removed)
    }

    /// True if the database holds no entries
    pub fn is_empty(&self, db: &Database) -> Result<bool> {
        Ok(self.key_after(db, None)?.is_none())
    }

    /// First key strictly after `after` (or the first key overall)
    ///
    /// Only the key is copied out of the map; values are never touched.
    pub(crate) fn key_after(&self, db: &Database, after: Option<&[u8]>) -> Result<Option<Vec<u8>>> {
        let raw = db.raw()?;
        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| BinStoreError::engine("begin read", e))?;
        let cursor = txn
            .open_ro_cursor(raw)
            .map_err(|e| BinStoreError::engine("open cursor", e))?;

        let key = match after {
            None => cursor_key(cursor.get(None, None, MDB_FIRST), &[])?,
            Some(after) => match cursor_key(cursor.get(Some(after), None, MDB_SET_RANGE), after)? {
                Some(found) if found != after => Some(found),
                Some(_) => cursor_key(cursor.get(None, None, MDB_NEXT), &[])?,
                None => None,
            },
        };
        Ok(key.map(<[u8]>::to_vec))
    }

    /// Flush buffered writes to disk
    pub fn sync(&self, force: bool) -> Result<()> {
        self.env
            .sync(force)
            .map_err(|e| BinStoreError::engine("sync", e))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn begin_write(&self) -> Result<RwTransaction<'_>> {
        self.env
            .begin_rw_txn()
            .map_err(|e| BinStoreError::engine("begin write", e))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("path", &self.path)
            .finish()
    }
}

/// Map an engine result to a status, keeping real failures as errors
fn status_of(
    result: std::result::Result<(), lmdb::Error>,
    operation: &'static str,
) -> Result<OperationStatus> {
    match result {
        Ok(()) => Ok(OperationStatus::Success),
        Err(lmdb::Error::NotFound) => Ok(OperationStatus::NotFound),
        Err(lmdb::Error::KeyExist) => Ok(OperationStatus::KeyExist),
        Err(e) => Err(BinStoreError::engine(operation, e)),
    }
}

/// Key under the cursor after a positioning call, `None` past the end
fn cursor_key<'a>(
    result: std::result::Result<(Option<&'a [u8]>, &'a [u8]), lmdb::Error>,
    requested: &'a [u8],
) -> Result<Option<&'a [u8]>> {
    match result {
        // LMDB leaves the key untouched when it already points at the match
        Ok((key, _value)) => Ok(Some(key.unwrap_or(requested))),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(BinStoreError::engine("cursor get", e)),
    }
}
