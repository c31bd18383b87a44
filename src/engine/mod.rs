//! Engine Module
//!
//! Adapter over the embedded LMDB engine.
//!
//! ## Responsibilities
//! - Open environments from tuning parameters
//! - Create, open and remove named databases
//! - Get/put/delete by key with an explicit operation status
//! - Forward-only key cursors and write-cursor deletion
//!
//! ## Status Model
//! ```text
//! engine result ──► Success | NotFound | KeyExist   (OperationStatus)
//!               └─► any other failure               (BinStoreError::Engine)
//! key outside 1..=MAX_KEY_SIZE ──► put: BinStoreError::KeySize, get/delete: NotFound
//! ```

mod cursor;
mod database;
mod environment;
mod tuning;

pub use cursor::KeyCursor;
pub use database::Database;
pub use environment::Environment;
pub use tuning::{
    EnvironmentTuning, DEFAULT_MAP_SIZE, DEFAULT_MAX_DBS, DEFAULT_MAX_READERS, PARAM_PREFIX,
    QUALIFIED_PARAM_PREFIX,
};

/// Largest key the engine accepts; empty keys are rejected too
pub const MAX_KEY_SIZE: usize = 511;

/// True if the engine can store `key`
pub fn key_fits(key: &[u8]) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_SIZE
}

/// Outcome of a single engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation took effect
    Success,

    /// The key (or database entry) does not exist
    NotFound,

    /// The key already exists and the operation refused to overwrite it
    KeyExist,
}
