//! Binary Store
//!
//! Per-store facade over one database holder.
//!
//! ## Locking
//! Every call takes the store lock for the length of its engine call. The
//! `AccessPolicy` decides whether data calls take it exclusively
//! (`Serialized`) or shared (`Shared`); `erase_all` and `close` are always
//! exclusive.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::AccessPolicy;
use crate::engine::{KeyCursor, OperationStatus};
use crate::error::{BinStoreError, Result};
use crate::factory::DatabaseFactory;

use super::{DatabaseHolder, Keys};

/// A key/value store of raw bytes
///
/// Created by a [`BinaryStoreManager`](super::BinaryStoreManager). Named
/// stores are persistent, unnamed ones are temporary and vanish with their
/// holder. Safe to share between threads.
#[derive(Debug)]
pub struct BinaryStore {
    shared: Arc<StoreShared>,
}

/// State shared between a store and its key iterators
#[derive(Debug)]
pub(crate) struct StoreShared {
    name: Option<String>,
    policy: AccessPolicy,
    state: RwLock<StoreState>,
}

#[derive(Debug)]
pub(crate) struct StoreState {
    attachment: Option<Attachment>,
}

/// What an open store holds on to
///
/// The holder is declared first so it closes before the factory can.
#[derive(Debug)]
pub(crate) struct Attachment {
    holder: Arc<DatabaseHolder>,
    factory: Arc<DatabaseFactory>,
}

impl BinaryStore {
    pub(crate) fn new(
        name: Option<&str>,
        policy: AccessPolicy,
        holder: DatabaseHolder,
        factory: Arc<DatabaseFactory>,
    ) -> Self {
        let attachment = Attachment {
            holder: Arc::new(holder),
            factory,
        };

        Self {
            shared: Arc::new(StoreShared {
                name: name.map(str::to_string),
                policy,
                state: RwLock::new(StoreState {
                    attachment: Some(attachment),
                }),
            }),
        }
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Get the value stored under `key`
    pub fn load(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.shared.with_attachment(|attachment| {
            let holder = &attachment.holder;
            match holder.environment()?.get(holder.database(), key)? {
                (OperationStatus::Success, value) => Ok(value),
                (OperationStatus::NotFound, _) => Ok(None),
                (status, _) => Err(BinStoreError::UnexpectedStatus {
                    operation: "load",
                    status,
                }),
            }
        })
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn store(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.shared.with_attachment(|attachment| {
            let holder = &attachment.holder;
            match holder.environment()?.put(holder.database(), key, value)? {
                OperationStatus::Success => Ok(()),
                status => Err(BinStoreError::UnexpectedStatus {
                    operation: "store",
                    status,
                }),
            }
        })
    }

    /// Remove `key`; removing an absent key is not an error
    pub fn erase(&self, key: &[u8]) -> Result<()> {
        self.shared.with_attachment(|attachment| {
            let holder = &attachment.holder;
            match holder.environment()?.delete(holder.database(), key)? {
                OperationStatus::Success | OperationStatus::NotFound => Ok(()),
                status => Err(BinStoreError::UnexpectedStatus {
                    operation: "erase",
                    status,
                }),
            }
        })
    }

    /// Remove every entry
    ///
    /// A temporary store switches to a brand-new database and drops the old
    /// one. A persistent store keeps its database and deletes the entries
    /// one by one.
    pub fn erase_all(&self) -> Result<()> {
        let mut state = self.shared.state.write();
        let attachment = state.attached_mut()?;

        if attachment.holder.is_temporary() {
            let fresh = Arc::new(DatabaseHolder::new(&attachment.factory, None)?);
            let stale = std::mem::replace(&mut attachment.holder, fresh);
            drop(state);

            tracing::debug!("Replaced temporary database \"{}\"", stale.name());
            drop(stale);
            return Ok(());
        }

        let holder = &attachment.holder;
        let removed = holder.environment()?.delete_all(holder.database())?;
        tracing::debug!("Erased {} entries from \"{}\"", removed, holder.name());
        Ok(())
    }

    /// Iterate over all keys
    ///
    /// The sequence is forward-only and reads no values. It ends early,
    /// without an error, if the store is closed or a temporary store is
    /// erased while iterating.
    pub fn keys(&self) -> Result<Keys> {
        let (holder_id, cursor, first) = self.shared.with_attachment(|attachment| {
            let holder = &attachment.holder;
            let env = holder.environment()?;
            let mut cursor = KeyCursor::new();
            let first = cursor.advance(&env, holder.database())?;
            Ok((holder.id(), cursor, first))
        })?;

        Ok(Keys::new(Arc::clone(&self.shared), holder_id, cursor, first))
    }

    /// Release this store's database
    ///
    /// Every later call fails with a use-after-close error. Closing twice is
    /// a no-op.
    pub fn close(&self) {
        let attachment = self.shared.state.write().attachment.take();
        // closes outside the store lock
        drop(attachment);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Name the store was created with, `None` for temporary stores
    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    pub fn is_temporary(&self) -> bool {
        self.shared.name.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.read().attachment.is_none()
    }

    pub fn access_policy(&self) -> AccessPolicy {
        self.shared.policy
    }

    /// Name of the database currently backing the store
    pub fn database_name(&self) -> Option<String> {
        self.shared
            .state
            .read()
            .attachment
            .as_ref()
            .map(|attachment| attachment.holder.name().to_string())
    }
}

impl StoreShared {
    /// Run `f` under the store lock, taken as the policy dictates
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        match self.policy {
            AccessPolicy::Serialized => f(&self.state.write()),
            AccessPolicy::Shared => f(&self.state.read()),
        }
    }

    fn with_attachment<R>(&self, f: impl FnOnce(&Attachment) -> Result<R>) -> Result<R> {
        self.with_state(|state| f(state.attached()?))
    }
}

impl StoreState {
    /// Holder currently backing the store, if still open
    pub(crate) fn holder(&self) -> Option<&Arc<DatabaseHolder>> {
        self.attachment.as_ref().map(|attachment| &attachment.holder)
    }

    fn attached(&self) -> Result<&Attachment> {
        self.attachment
            .as_ref()
            .ok_or_else(|| BinStoreError::closed("store is closed"))
    }

    fn attached_mut(&mut self) -> Result<&mut Attachment> {
        self.attachment
            .as_mut()
            .ok_or_else(|| BinStoreError::closed("store is closed"))
    }
}
