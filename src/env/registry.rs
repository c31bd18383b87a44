//! Shutdown Registry
//!
//! Explicit list of live environments to close at orderly shutdown.
//!
//! Entries are weak: registering an environment never keeps it alive, so a
//! factory that nobody uses can still be reclaimed. An environment
//! deregisters itself when closed with `deregister = true`.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::EnvironmentHolder;

/// Registry of environments to close on shutdown
#[derive(Debug, Default)]
pub struct ShutdownRegistry {
    live: Mutex<HashMap<u64, Weak<EnvironmentHolder>>>,
    next_id: AtomicU64,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an environment, returning its registration id
    pub fn register(&self, holder: &Arc<EnvironmentHolder>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id, Arc::downgrade(holder));
        id
    }

    pub fn deregister(&self, id: u64) {
        self.live.lock().remove(&id);
    }

    /// Number of registered environments that are still alive
    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .values()
            .filter(|holder| holder.strong_count() > 0)
            .count()
    }

    /// Close every registered environment
    ///
    /// Failures are logged and swallowed: there is nobody left to report
    /// them to.
    pub fn shutdown(&self) {
        // collect first, closing must not run under the registry lock
        let holders: Vec<Arc<EnvironmentHolder>> = self
            .live
            .lock()
            .drain()
            .filter_map(|(_, holder)| holder.upgrade())
            .collect();

        if !holders.is_empty() {
            tracing::info!("Shutting down {} environment(s)", holders.len());
        }

        for holder in holders {
            let closed = panic::catch_unwind(AssertUnwindSafe(|| holder.close_environment(false)));
            if closed.is_err() {
                tracing::warn!("Ignoring panic while closing {} during shutdown", holder);
            }
        }
    }
}

impl Drop for ShutdownRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
