//! Database Factory Manager
//!
//! Shares one factory (and so one environment) between equal
//! configurations.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::EnvironmentConfig;
use crate::env::ShutdownRegistry;
use crate::error::Result;

use super::DatabaseFactory;

/// Cache from environment configuration to its shared factory
///
/// Owned by the embedding application; there is no process-wide instance.
/// Entries are weak, so a factory no store uses any more is dropped and its
/// environment closed. Dropping the manager (or calling
/// [`shutdown`](Self::shutdown)) closes every environment still open.
#[derive(Debug, Default)]
pub struct DatabaseFactoryManager {
    factories: Mutex<HashMap<EnvironmentConfig, Weak<DatabaseFactory>>>,
    registry: Arc<ShutdownRegistry>,
}

impl DatabaseFactoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the factory for `config`, creating it if none is alive
    ///
    /// Equal configurations get the same factory for as long as it lives
    /// and its environment stays open. A factory closed by
    /// [`shutdown`](Self::shutdown) is replaced by a new one.
    pub fn ensure_factory(&self, config: &EnvironmentConfig) -> Result<Arc<DatabaseFactory>> {
        let mut factories = self.factories.lock();

        if let Some(factory) = factories.get(config).and_then(live_factory) {
            return Ok(factory);
        }

        factories.retain(|_, factory| live_factory(factory).is_some());

        let factory = Arc::new(DatabaseFactory::new(config, &self.registry)?);
        factories.insert(config.clone(), Arc::downgrade(&factory));
        Ok(factory)
    }

    /// Number of cached factories still alive and open
    pub fn factory_count(&self) -> usize {
        self.factories
            .lock()
            .values()
            .filter(|factory| live_factory(factory).is_some())
            .count()
    }

    pub fn registry(&self) -> &Arc<ShutdownRegistry> {
        &self.registry
    }

    /// Close every environment created through this manager
    ///
    /// Stores still holding a database afterwards fail with a
    /// use-after-close error.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

fn live_factory(factory: &Weak<DatabaseFactory>) -> Option<Arc<DatabaseFactory>> {
    factory
        .upgrade()
        .filter(|factory| !factory.env_holder().is_closed())
}
