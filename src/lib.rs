//! # binstore
//!
//! Binary key/value stores on shared LMDB environments, with:
//! - Temporary stores that clean up after themselves, on disk too
//! - Persistent named stores that survive restarts
//! - One environment per distinct configuration, shared between stores
//! - Advisory directory locks so one owner uses an environment at a time
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BinaryStoreManager                        │
//! │              create_store / destroy_store                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 DatabaseFactoryManager                       │
//! │          (EnvironmentConfig ──► DatabaseFactory)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────┐
//!   │ BinaryStore │─────────►│ DatabaseFactory  │
//!   │  (RwLock)   │          └────────┬─────────┘
//!   └──────┬──────┘                   │
//!          ▼                          ▼
//!   ┌───────────────┐        ┌───────────────────┐
//!   │DatabaseHolder │───────►│ EnvironmentHolder │──► DirectoryLock
//!   └───────────────┘        └─────────┬─────────┘
//!                                      ▼
//!                              ┌──────────────┐
//!                              │ LMDB engine  │
//!                              └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use binstore::{BinaryStoreManager, DatabaseFactoryManager, StoreManagerConfig};
//!
//! # fn main() -> binstore::Result<()> {
//! let manager = BinaryStoreManager::new(Arc::new(DatabaseFactoryManager::new()));
//! let config = StoreManagerConfig::builder().param("lmdb.map_size", "67108864").build();
//!
//! let store = manager.create_store(None, &config)?;
//! store.store(b"x", b"1")?;
//! assert_eq!(store.load(b"x")?, Some(b"1".to_vec()));
//! manager.destroy_store(store);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod engine;
pub mod env;
pub mod factory;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BinStoreError, ErrorKind, Result};
pub use config::{AccessPolicy, EnvironmentConfig, StoreManagerConfig};
pub use engine::MAX_KEY_SIZE;
pub use factory::DatabaseFactoryManager;
pub use store::{BinaryStore, BinaryStoreManager, Keys};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of binstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
