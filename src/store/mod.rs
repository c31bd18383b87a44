//! Store Module
//!
//! Caller-facing stores of raw bytes.
//!
//! ## Responsibilities
//! - Create stores against shared environments
//! - Load, store and erase values by key
//! - Clear a store and iterate its keys
//! - Close databases on release, removing temporary and empty ones
//!
//! ## Ownership
//! ```text
//! BinaryStore ──► DatabaseHolder ──► EnvironmentHolder
//!      │               ┆ (weak)            ▲
//!      └──────────► DatabaseFactory ───────┘
//! ```

mod binary_store;
mod holder;
mod keys;
mod manager;

pub use binary_store::BinaryStore;
pub use holder::DatabaseHolder;
pub use keys::Keys;
pub use manager::BinaryStoreManager;
