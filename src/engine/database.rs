//! Database handle
//!
//! A named LMDB database opened within one environment. Closing the handle
//! poisons it: the raw database id is dropped and every later use fails.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{BinStoreError, Result};

/// Source of process-unique handle ids
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// An opened, named database
#[derive(Debug)]
pub struct Database {
    /// Process-unique id of this handle (not of the on-disk database)
    id: u64,

    /// Name of the database within its environment
    name: String,

    /// Raw LMDB handle, `None` once closed
    handle: Mutex<Option<lmdb::Database>>,
}

impl Database {
    pub(crate) fn new(name: impl Into<String>, handle: lmdb::Database) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.handle.lock().is_none()
    }

    /// Close the handle
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.take().is_some()
    }

    /// Raw handle for an engine call
    pub(crate) fn raw(&self) -> Result<lmdb::Database> {
        (*self.handle.lock())
            .ok_or_else(|| BinStoreError::closed(format!("database \"{}\" is closed", self.name)))
    }

    /// Take the raw handle, leaving this one closed
    pub(crate) fn take(&self) -> Option<lmdb::Database> {
        self.handle.lock().take()
    }
}
