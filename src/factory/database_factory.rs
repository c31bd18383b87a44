//! Database Factory
//!
//! Allocates databases against one environment.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::EnvironmentConfig;
use crate::engine::Database;
use crate::env::{EnvironmentHolder, ShutdownRegistry};
use crate::error::Result;

/// Per-environment allocator of databases
///
/// Dropping the last reference closes the environment and takes it out of
/// the shutdown registry.
pub struct DatabaseFactory {
    /// Environment every database is created in
    env_holder: Arc<EnvironmentHolder>,

    /// Counter used to generate unique database names
    next_db_id: Mutex<u64>,
}

impl DatabaseFactory {
    /// Create a factory and the environment it allocates from
    pub fn new(config: &EnvironmentConfig, registry: &Arc<ShutdownRegistry>) -> Result<Self> {
        Ok(Self {
            env_holder: EnvironmentHolder::open(config, registry)?,
            next_db_id: Mutex::new(0),
        })
    }

    /// Open (or create) a named database and track it
    ///
    /// Every database handed out by the factory is tracked by its
    /// environment.
    pub fn create_named_database(&self, name: &str) -> Result<Arc<Database>> {
        let env_holder = &self.env_holder;
        let db = Arc::new(env_holder.environment()?.open_database(name)?);

        env_holder.track_database(&db);
        tracing::debug!("Opened database \"{}\" (handle {})", name, db.id());

        Ok(db)
    }

    /// Get a database name unique within this factory
    pub fn unique_db_name(&self) -> String {
        let mut next = self.next_db_id.lock();
        let name = next.to_string();
        *next += 1;
        name
    }

    /// Stop tracking a database closed outside of environment teardown
    pub fn forget_database(&self, db: &Database) {
        self.env_holder.forget_database(db);
    }

    pub fn env_holder(&self) -> &Arc<EnvironmentHolder> {
        &self.env_holder
    }

    /// Value the next unique name will be generated from
    pub fn db_id_counter(&self) -> u64 {
        *self.next_db_id.lock()
    }
}

impl fmt::Display for DatabaseFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DatabaseFactory {{ Holder: {}, DB Id Counter: {} }}",
            self.env_holder,
            self.db_id_counter()
        )
    }
}

impl fmt::Debug for DatabaseFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseFactory")
            .field("env_holder", &self.env_holder)
            .field("next_db_id", &self.db_id_counter())
            .finish()
    }
}

impl Drop for DatabaseFactory {
    fn drop(&mut self) {
        self.env_holder.close_environment(true);
    }
}
