//! Key cursor
//!
//! Forward-only iteration over the keys of one database. The cursor keeps
//! only its position; each step runs in a fresh read transaction, so it
//! can be advanced from any thread and abandoned at any time.

use crate::error::Result;

use super::{Database, Environment};

/// Position of a forward-only scan over keys
#[derive(Debug, Default)]
pub struct KeyCursor {
    /// Last key returned, `None` before the first step
    position: Option<Vec<u8>>,

    /// Set once the end was reached or the cursor was closed
    exhausted: bool,
}

impl KeyCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next key and return it
    ///
    /// Returns `Ok(None)` once the database has no more keys; the cursor is
    /// closed at that point and stays at the end.
    pub fn advance(&mut self, env: &Environment, db: &Database) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }

        match env.key_after(db, self.position.as_deref())? {
            Some(key) => {
                self.position = Some(key.clone());
                Ok(Some(key))
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) {
        self.position = None;
        self.exhausted = true;
    }
}
