//! Factory Module
//!
//! Allocation of databases and sharing of environments.
//!
//! ## Responsibilities
//! - Open and track named databases in one environment (`DatabaseFactory`)
//! - Generate unique names for temporary databases
//! - Map equal configurations to one shared factory (`DatabaseFactoryManager`)

mod database_factory;
mod manager;

pub use database_factory::DatabaseFactory;
pub use manager::DatabaseFactoryManager;
