//! Database Holder
//!
//! Owns one database and knows how to close it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::engine::{Database, Environment};
use crate::env::EnvironmentHolder;
use crate::error::Result;
use crate::factory::DatabaseFactory;

/// Holder of one opened database
///
/// A holder created without a name gets a factory-unique name and is
/// temporary: its database is removed when the holder closes. A named
/// holder is persistent: its data is kept, unless the database is empty.
/// Dropping the holder closes it.
#[derive(Debug)]
pub struct DatabaseHolder {
    /// Environment the database lives in
    env_holder: Arc<EnvironmentHolder>,

    /// Factory that created the database, for deregistration only
    factory: Weak<DatabaseFactory>,

    /// The database itself
    database: Arc<Database>,

    /// Remove the database on close
    temporary: bool,

    /// Set once `close_db` ran
    closed: AtomicBool,
}

impl DatabaseHolder {
    /// Open a database through `factory`
    pub fn new(factory: &Arc<DatabaseFactory>, name: Option<&str>) -> Result<Self> {
        let (name, temporary) = match name {
            Some(name) => (name.to_string(), false),
            None => (factory.unique_db_name(), true),
        };

        let database = factory.create_named_database(&name)?;

        Ok(Self {
            env_holder: Arc::clone(factory.env_holder()),
            factory: Arc::downgrade(factory),
            database,
            temporary,
            closed: AtomicBool::new(false),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Handle id of the held database
    pub fn id(&self) -> u64 {
        self.database.id()
    }

    pub fn name(&self) -> &str {
        self.database.name()
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Environment for an engine call
    pub fn environment(&self) -> Result<Arc<Environment>> {
        self.env_holder.environment()
    }

    /// Close the database
    ///
    /// Stops tracking first, then removes the database if temporary or
    /// found empty, otherwise just closes it. Failures are logged. Runs at
    /// most once.
    pub fn close_db(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let db = &self.database;
        match self.factory.upgrade() {
            Some(factory) => factory.forget_database(db),
            None => self.env_holder.forget_database(db),
        }

        if db.is_closed() {
            // already closed with its environment
            return;
        }

        let env = match self.env_holder.environment() {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!("Error closing database \"{}\": {}", db.name(), e);
                db.close();
                return;
            }
        };

        let remove = if self.temporary {
            true
        } else {
            match env.is_empty(db) {
                // another open handle shares the name, keep it
                Ok(empty) => empty && !self.env_holder.is_name_tracked(db.name()),
                Err(e) => {
                    tracing::warn!("Error probing database \"{}\": {}", db.name(), e);
                    false
                }
            }
        };

        if remove {
            match env.remove_database(db) {
                Ok(()) => tracing::debug!("Removed database \"{}\"", db.name()),
                Err(e) => {
                    tracing::warn!("Error removing database \"{}\": {}", db.name(), e);
                    db.close();
                }
            }
        } else {
            db.close();
            tracing::debug!("Closed database \"{}\"", db.name());
        }
    }
}

impl Drop for DatabaseHolder {
    fn drop(&mut self) {
        self.close_db();
    }
}
