//! Configuration for binstore
//!
//! Centralized configuration with sensible defaults.
//!
//! `StoreManagerConfig` is what callers build. `EnvironmentConfig` is the
//! comparable identity derived from it: two stores whose environment
//! configs are equal share one environment.

use std::path::{Path, PathBuf};

/// Configuration for stores created by a `BinaryStoreManager`
#[derive(Debug, Clone, Default)]
pub struct StoreManagerConfig {
    // -------------------------------------------------------------------------
    // Placement
    // -------------------------------------------------------------------------
    /// Parent directory for environments
    ///
    /// `None` selects a default: a subdirectory of the system temp
    /// directory for temporary stores, `./binstore/lmdb` for persistent
    /// ones. Persistent environments live directly in this directory,
    /// temporary ones in a randomly named child of it.
    pub parent_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Engine Tuning
    // -------------------------------------------------------------------------
    /// Ordered key/value tuning pairs
    ///
    /// Only `lmdb.*` and `binstore.lmdb.*` keys reach the engine; everything
    /// else is ignored.
    pub params: Vec<(String, String)>,

    // -------------------------------------------------------------------------
    // Concurrency
    // -------------------------------------------------------------------------
    /// How concurrent calls into one store are admitted
    pub access_policy: AccessPolicy,
}

/// Admission policy for calls into a single store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    /// One call at a time per store (safest)
    #[default]
    Serialized,

    /// Concurrent load/store/erase/keys; erase_all and close stay exclusive
    Shared,
}

impl StoreManagerConfig {
    /// Create a new config builder
    pub fn builder() -> StoreManagerConfigBuilder {
        StoreManagerConfigBuilder::default()
    }
}

/// Builder for StoreManagerConfig
#[derive(Default)]
pub struct StoreManagerConfigBuilder {
    config: StoreManagerConfig,
}

impl StoreManagerConfigBuilder {
    /// Set the parent directory for environments
    pub fn parent_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.parent_dir = Some(path.into());
        self
    }

    /// Append one tuning pair
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.params.push((key.into(), value.into()));
        self
    }

    /// Append several tuning pairs, keeping their order
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the access policy for created stores
    pub fn access_policy(mut self, policy: AccessPolicy) -> Self {
        self.config.access_policy = policy;
        self
    }

    pub fn build(self) -> StoreManagerConfig {
        self.config
    }
}

/// Identity of an environment
///
/// Equal iff the tuning pairs, the parent directory and the temporary flag
/// are equal. Store names are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentConfig {
    params: Vec<(String, String)>,
    parent_dir: Option<PathBuf>,
    temporary: bool,
}

impl EnvironmentConfig {
    pub fn new(config: &StoreManagerConfig, temporary: bool) -> Self {
        Self {
            params: config.params.clone(),
            parent_dir: config.parent_dir.clone(),
            temporary,
        }
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn parent_dir(&self) -> Option<&Path> {
        self.parent_dir.as_deref()
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }
}
