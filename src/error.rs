//! Error types for binstore
//!
//! Provides a unified error type for all store and lifecycle operations.
//!
//! Teardown failures have no variant here. They are logged where they
//! happen and never reach a caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::OperationStatus;

/// Result type alias using BinStoreError
pub type Result<T> = std::result::Result<T, BinStoreError>;

/// Coarse classification of a [`BinStoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The environment directory is unusable or owned by someone else
    Setup,

    /// The engine failed or answered with an unexpected status
    EngineOperation,

    /// A store, database handle or environment was used after close
    UseAfterClose,
}

/// Unified error type for binstore operations
#[derive(Debug, Error)]
pub enum BinStoreError {
    // -------------------------------------------------------------------------
    // Setup Errors
    // -------------------------------------------------------------------------
    #[error("The specified parent directory \"{}\" is a file", .0.display())]
    DirectoryIsFile(PathBuf),

    #[error("Unable to create environment directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error locking directory {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to open environment {}: already locked", .0.display())]
    DirectoryLocked(PathBuf),

    #[error("Unable to open environment {}: {source}", path.display())]
    OpenEnvironment {
        path: PathBuf,
        #[source]
        source: lmdb::Error,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine error during {operation}: {source}")]
    Engine {
        operation: &'static str,
        #[source]
        source: lmdb::Error,
    },

    #[error("Key of {len} bytes is outside the engine key size range 1..={max}")]
    KeySize { len: usize, max: usize },

    #[error("Unexpected engine status {status:?} during {operation}")]
    UnexpectedStatus {
        operation: &'static str,
        status: OperationStatus,
    },

    // -------------------------------------------------------------------------
    // State Errors
    // -------------------------------------------------------------------------
    #[error("Illegal state: {0}")]
    UseAfterClose(String),
}

impl BinStoreError {
    /// Wrap an engine failure with the operation that caused it
    pub fn engine(operation: &'static str, source: lmdb::Error) -> Self {
        BinStoreError::Engine { operation, source }
    }

    pub fn closed(what: impl Into<String>) -> Self {
        BinStoreError::UseAfterClose(what.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BinStoreError::DirectoryIsFile(_)
            | BinStoreError::CreateDirectory { .. }
            | BinStoreError::Lock { .. }
            | BinStoreError::DirectoryLocked(_)
            | BinStoreError::OpenEnvironment { .. }
            | BinStoreError::Config(_) => ErrorKind::Setup,
            BinStoreError::Engine { .. }
            | BinStoreError::KeySize { .. }
            | BinStoreError::UnexpectedStatus { .. } => ErrorKind::EngineOperation,
            BinStoreError::UseAfterClose(_) => ErrorKind::UseAfterClose,
        }
    }

    pub fn is_setup(&self) -> bool {
        self.kind() == ErrorKind::Setup
    }
}
