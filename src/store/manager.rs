//! Binary Store Manager
//!
//! Entry point for creating and destroying stores.

use std::sync::Arc;

use crate::config::{EnvironmentConfig, StoreManagerConfig};
use crate::error::Result;
use crate::factory::DatabaseFactoryManager;

use super::{BinaryStore, DatabaseHolder};

/// Creates stores against the environments of a [`DatabaseFactoryManager`]
///
/// Stores with equal configurations (and the same temporary flag) share an
/// environment; each still gets its own database.
#[derive(Debug, Clone)]
pub struct BinaryStoreManager {
    factories: Arc<DatabaseFactoryManager>,
}

impl BinaryStoreManager {
    pub fn new(factories: Arc<DatabaseFactoryManager>) -> Self {
        Self { factories }
    }

    /// Create a store
    ///
    /// With a `name` the store is persistent and reopens the same data next
    /// time; without one it is temporary.
    pub fn create_store(&self, name: Option<&str>, config: &StoreManagerConfig) -> Result<BinaryStore> {
        let env_config = EnvironmentConfig::new(config, name.is_none());
        let factory = self.factories.ensure_factory(&env_config)?;
        let holder = DatabaseHolder::new(&factory, name)?;

        Ok(BinaryStore::new(name, config.access_policy, holder, factory))
    }

    /// Close a store and release its database
    pub fn destroy_store(&self, store: BinaryStore) {
        store.close();
    }

    pub fn factories(&self) -> &Arc<DatabaseFactoryManager> {
        &self.factories
    }
}
