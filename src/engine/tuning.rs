//! Environment tuning
//!
//! Translates the flat string parameters of a store configuration into
//! LMDB environment settings.

use std::str::FromStr;

use lmdb::EnvironmentFlags;

use crate::error::{BinStoreError, Result};

// =============================================================================
// Parameter Naming
// =============================================================================

/// Prefix of parameters forwarded to the engine
pub const PARAM_PREFIX: &str = "lmdb.";

/// Fully qualified alias of [`PARAM_PREFIX`]
pub const QUALIFIED_PARAM_PREFIX: &str = "binstore.lmdb.";

// =============================================================================
// Defaults
// =============================================================================

/// Default map size (1 GiB; the data file grows sparsely)
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Default number of named databases per environment
pub const DEFAULT_MAX_DBS: u32 = 1024;

/// Default number of concurrent reader slots
pub const DEFAULT_MAX_READERS: u32 = 126;

/// Settings used to open one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentTuning {
    /// Maximum size of the memory map in bytes
    pub map_size: usize,

    /// Maximum number of named databases
    pub max_dbs: u32,

    /// Maximum number of concurrent read transactions
    pub max_readers: u32,

    /// LMDB environment flags
    pub flags: EnvironmentFlags,
}

impl EnvironmentTuning {
    /// Baseline settings, before any configured parameter is applied
    ///
    /// Readahead is off to keep the engine's page cache footprint small.
    /// Reader slots belong to transactions rather than threads. Temporary
    /// environments skip fsync entirely; persistent ones keep full
    /// synchronous commits so they survive a crash.
    pub fn baseline(temporary: bool) -> Self {
        let mut flags = EnvironmentFlags::NO_READAHEAD | EnvironmentFlags::NO_TLS;
        if temporary {
            flags.insert(EnvironmentFlags::NO_SYNC | EnvironmentFlags::NO_META_SYNC);
        }

        Self {
            map_size: DEFAULT_MAP_SIZE,
            max_dbs: DEFAULT_MAX_DBS,
            max_readers: DEFAULT_MAX_READERS,
            flags,
        }
    }

    /// Return the engine parameter name for a configuration key, if the key
    /// carries a recognized prefix
    pub fn param_name(key: &str) -> Option<&str> {
        key.strip_prefix(QUALIFIED_PARAM_PREFIX)
            .or_else(|| key.strip_prefix(PARAM_PREFIX))
    }

    /// Apply one engine parameter (name without prefix)
    pub fn apply(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "map_size" => self.map_size = parse_number(name, value)?,
            "max_dbs" => self.max_dbs = parse_number(name, value)?,
            "max_readers" => self.max_readers = parse_number(name, value)?,
            _ => {
                let flag = flag_for(name).ok_or_else(|| {
                    BinStoreError::Config(format!("unknown engine parameter \"{}\"", name))
                })?;
                self.flags.set(flag, parse_flag(name, value)?);
            }
        }
        Ok(())
    }
}

fn flag_for(name: &str) -> Option<EnvironmentFlags> {
    let flag = match name {
        "no_sync" => EnvironmentFlags::NO_SYNC,
        "no_meta_sync" => EnvironmentFlags::NO_META_SYNC,
        "map_async" => EnvironmentFlags::MAP_ASYNC,
        "write_map" => EnvironmentFlags::WRITE_MAP,
        "no_read_ahead" => EnvironmentFlags::NO_READAHEAD,
        "no_tls" => EnvironmentFlags::NO_TLS,
        _ => return None,
    };
    Some(flag)
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        BinStoreError::Config(format!(
            "engine parameter \"{}\" expects a number, got \"{}\"",
            name, value
        ))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(BinStoreError::Config(format!(
            "engine parameter \"{}\" expects a boolean, got \"{}\"",
            name, value
        ))),
    }
}
