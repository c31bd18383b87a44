//! Environment Holder
//!
//! Owns one engine environment bound to a directory and coordinates its
//! teardown.
//!
//! ## Responsibilities
//! - Resolve the directory and tuning from an `EnvironmentConfig`
//! - Claim the directory with a `DirectoryLock`
//! - Track every open database so it is closed before the environment
//! - Reopen the environment when the engine reports it unusable
//! - Delete temporary environments from disk on close

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::config::EnvironmentConfig;
use crate::engine::{Database, Environment, EnvironmentTuning};
use crate::error::{BinStoreError, Result};

use super::{DirectoryLock, ShutdownRegistry};

/// Prefix of randomly named temporary environment directories
pub const ENVIRONMENT_NAME_PREFIX: &str = "lmdbtemp";

const TEMPORARY_LOCK_TEXT: &str =
    "Locked binstore temporary LMDB directory, will be auto-deleted.";
const PERSISTENT_LOCK_TEXT: &str = "Locked binstore persistent LMDB directory.";

/// Longest a reopen waits for in-flight calls to release the old environment
const REOPEN_WAIT: Duration = Duration::from_millis(500);

/// Default parent directory, relative to the working directory for
/// persistent stores and to the system temp directory for temporary ones
pub fn default_sub_dir() -> PathBuf {
    Path::new("binstore").join("lmdb")
}

/// Holder for one environment and the databases opened in it
///
/// ## Concurrency:
/// - `state`: RwLock, read for handing out the environment, write for
///   (re)opening and closing it
/// - `tracked`: separate Mutex, so opening databases never contends with
///   data access on existing ones
pub struct EnvironmentHolder {
    /// Identity this environment was created for
    config: EnvironmentConfig,

    /// Resolved parent directory
    parent_dir: PathBuf,

    /// Settings used for every (re)open
    tuning: EnvironmentTuning,

    /// Current environment, its directory and lock
    state: RwLock<EnvironmentState>,

    /// Open databases, keyed by handle id
    tracked: Mutex<HashMap<u64, Arc<Database>>>,

    /// Entry in the shutdown registry, if still registered
    registration: Mutex<Option<Registration>>,
}

#[derive(Default)]
struct EnvironmentState {
    env: Option<Arc<Environment>>,
    dir_env: Option<PathBuf>,
    dir_lock: Option<DirectoryLock>,
    closed: bool,

    /// Bumped on every successful (re)open
    generation: u64,
}

struct Registration {
    registry: Weak<ShutdownRegistry>,
    id: u64,
}

impl EnvironmentHolder {
    /// Create the environment and register it for shutdown
    pub fn open(config: &EnvironmentConfig, registry: &Arc<ShutdownRegistry>) -> Result<Arc<Self>> {
        let (parent_dir, tuning) = Self::configure(config)?;

        let holder = Self {
            config: config.clone(),
            parent_dir,
            tuning,
            state: RwLock::new(EnvironmentState::default()),
            tracked: Mutex::new(HashMap::new()),
            registration: Mutex::new(None),
        };
        holder.create(&mut holder.state.write())?;

        let holder = Arc::new(holder);
        let id = registry.register(&holder);
        *holder.registration.lock() = Some(Registration {
            registry: Arc::downgrade(registry),
            id,
        });

        tracing::info!("Opened {}", holder);
        Ok(holder)
    }

    /// Resolve the parent directory and the engine tuning
    fn configure(config: &EnvironmentConfig) -> Result<(PathBuf, EnvironmentTuning)> {
        let temporary = config.is_temporary();

        let parent_dir = match config.parent_dir() {
            Some(dir) => dir.to_path_buf(),
            None if temporary => std::env::temp_dir().join(default_sub_dir()),
            None => default_sub_dir(),
        };

        // created later on demand
        if parent_dir.is_file() {
            return Err(BinStoreError::DirectoryIsFile(parent_dir));
        }

        let mut tuning = EnvironmentTuning::baseline(temporary);
        for (key, value) in config.params() {
            match EnvironmentTuning::param_name(key) {
                Some(name) => tuning.apply(name, value)?,
                None => tracing::debug!("Ignoring non-engine parameter \"{}\"", key),
            }
        }

        Ok((parent_dir, tuning))
    }

    // =========================================================================
    // Environment Access
    // =========================================================================

    /// Get the environment, reopening it first if the engine reports it
    /// unusable
    ///
    /// A reopen waits for in-flight calls to drop the old environment; the
    /// engine must never have the same directory open twice.
    pub fn environment(&self) -> Result<Arc<Environment>> {
        let generation = {
            let state = self.state.read();
            let env = state.current()?;
            match env.probe() {
                Ok(()) => return Ok(Arc::clone(env)),
                Err(e) if Environment::needs_reopen(&e) => state.generation,
                Err(e) => return Err(BinStoreError::engine("probe environment", e)),
            }
        };

        let mut state = self.state.write();
        if state.generation != generation {
            // recovered by another thread meanwhile
            return state.current().map(Arc::clone);
        }

        {
            let stale = state.current()?;
            tracing::warn!("Environment {} is unusable, reopening", stale.path().display());
            if !wait_for_sole_owner(stale) {
                tracing::warn!(
                    "Environment {} is still in use, not reopening",
                    stale.path().display()
                );
                return Err(BinStoreError::engine("reopen environment", lmdb::Error::Panic));
            }
        }

        self.close_locked(&mut state);
        self.create(&mut state)?;
        state.current().map(Arc::clone)
    }

    fn create(&self, state: &mut EnvironmentState) -> Result<()> {
        if self.is_temporary() {
            self.create_temporary(state)?;
        } else {
            self.create_persistent(state)?;
        }
        state.generation += 1;
        Ok(())
    }

    /// Create and lock a fresh, randomly named directory and open there
    fn create_temporary(&self, state: &mut EnvironmentState) -> Result<()> {
        fs::create_dir_all(&self.parent_dir).map_err(|source| BinStoreError::CreateDirectory {
            path: self.parent_dir.clone(),
            source,
        })?;

        loop {
            let dir_env = self.parent_dir.join(generate_environment_name());
            match fs::create_dir(&dir_env) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(BinStoreError::CreateDirectory {
                        path: dir_env,
                        source,
                    })
                }
            }

            let Some(dir_lock) = lock_new_directory(&dir_env, TEMPORARY_LOCK_TEXT)? else {
                tracing::debug!("Lost race for {}, picking another name", dir_env.display());
                continue;
            };

            let env = match Environment::open(&dir_env, &self.tuning) {
                Ok(env) => env,
                Err(e) => {
                    drop(dir_lock);
                    delete_environment_directory(&dir_env);
                    return Err(e);
                }
            };

            state.env = Some(Arc::new(env));
            state.dir_env = Some(dir_env);
            state.dir_lock = Some(dir_lock);
            return Ok(());
        }
    }

    /// Lock the configured directory exactly once and open there
    fn create_persistent(&self, state: &mut EnvironmentState) -> Result<()> {
        let dir_env = self.parent_dir.clone();

        if !dir_env.exists() {
            fs::create_dir_all(&dir_env).map_err(|source| BinStoreError::CreateDirectory {
                path: dir_env.clone(),
                source,
            })?;
        }

        let mut dir_lock = DirectoryLock::new(&dir_env, PERSISTENT_LOCK_TEXT);
        if !dir_lock.try_lock()? {
            return Err(BinStoreError::DirectoryLocked(dir_env));
        }

        let env = Environment::open(&dir_env, &self.tuning)?;

        state.env = Some(Arc::new(env));
        state.dir_env = Some(dir_env);
        state.dir_lock = Some(dir_lock);
        Ok(())
    }

    // =========================================================================
    // Database Tracking
    // =========================================================================

    /// Track an open database so it is closed before the environment
    pub fn track_database(&self, db: &Arc<Database>) {
        self.tracked.lock().insert(db.id(), Arc::clone(db));
    }

    /// Stop tracking a database that is being closed externally
    pub fn forget_database(&self, db: &Database) {
        self.tracked.lock().remove(&db.id());
    }

    /// True if an open database with this name is still tracked
    pub fn is_name_tracked(&self, name: &str) -> bool {
        self.tracked.lock().values().any(|db| db.name() == name)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().len()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Close the environment
    ///
    /// Closes every tracked database, then the environment, releases the
    /// directory lock and, if temporary, deletes the directory. Persistent
    /// databases found empty are removed instead of kept. Failures are
    /// logged, never returned. Safe to call more than once.
    pub fn close_environment(&self, deregister: bool) {
        if deregister {
            self.deregister();
        }

        let mut state = self.state.write();
        state.closed = true;
        self.close_locked(&mut state);
    }

    fn close_locked(&self, state: &mut EnvironmentState) {
        let temporary = self.is_temporary();

        if let Some(env) = state.env.take() {
            let mut tracked = self.tracked.lock();
            let mut removed = HashSet::new();

            for (_, db) in tracked.drain() {
                if temporary || removed.contains(db.name()) {
                    db.close();
                    continue;
                }

                match env.is_empty(&db) {
                    Ok(true) => match env.remove_database(&db) {
                        Ok(()) => {
                            tracing::debug!("Removed empty database \"{}\"", db.name());
                            removed.insert(db.name().to_string());
                        }
                        Err(e) => {
                            tracing::warn!("Error removing database \"{}\": {}", db.name(), e);
                            db.close();
                        }
                    },
                    Ok(false) => {
                        db.close();
                    }
                    Err(e) => {
                        tracing::warn!("Error closing database \"{}\": {}", db.name(), e);
                        db.close();
                    }
                }
            }
            drop(tracked);

            if !temporary {
                if let Err(e) = env.sync(true) {
                    tracing::warn!("Error flushing environment {}: {}", env.path().display(), e);
                }
            }
            tracing::info!("Closed environment {}", env.path().display());
            // the engine closes once in-flight calls drop their clones
            drop(env);
        }

        if let Some(mut dir_lock) = state.dir_lock.take() {
            if let Err(e) = dir_lock.try_unlock() {
                tracing::warn!("Error releasing lock on environment: {}", e);
            }
        }

        if let Some(dir_env) = state.dir_env.take() {
            if temporary {
                delete_environment_directory(&dir_env);
            }
        }
    }

    fn deregister(&self) {
        if let Some(registration) = self.registration.lock().take() {
            if let Some(registry) = registration.registry.upgrade() {
                registry.deregister(registration.id);
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn tuning(&self) -> &EnvironmentTuning {
        &self.tuning
    }

    /// Directory the environment currently lives in
    pub fn env_dir(&self) -> Option<PathBuf> {
        self.state.read().dir_env.clone()
    }

    pub fn is_temporary(&self) -> bool {
        self.config.is_temporary()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Number of successful (re)opens so far
    #[cfg(test)]
    fn generation(&self) -> u64 {
        self.state.read().generation
    }
}

impl EnvironmentState {
    fn current(&self) -> Result<&Arc<Environment>> {
        self.env
            .as_ref()
            .ok_or_else(|| BinStoreError::closed("environment is closed"))
    }
}

impl fmt::Display for EnvironmentHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EnvironmentHolder {{ Parent: {}, Temporary: {}, Params: {:?} }}",
            self.parent_dir.display(),
            self.is_temporary(),
            self.config.params()
        )
    }
}

impl fmt::Debug for EnvironmentHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentHolder")
            .field("config", &self.config)
            .field("parent_dir", &self.parent_dir)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

impl Drop for EnvironmentHolder {
    fn drop(&mut self) {
        self.close_environment(true);
    }
}

/// Generate a probably-unique temporary environment name
pub fn generate_environment_name() -> String {
    format!("{}{}", ENVIRONMENT_NAME_PREFIX, rand::random::<u32>())
}

/// Lock a directory this process just created
///
/// On failure the directory is deleted again. Returns `Ok(None)` if
/// someone else holds the lock.
fn lock_new_directory(dir: &Path, text: &str) -> Result<Option<DirectoryLock>> {
    let mut dir_lock = DirectoryLock::new(dir, text);
    let locked = dir_lock.try_lock();
    match locked {
        Ok(true) => Ok(Some(dir_lock)),
        locked => {
            drop(dir_lock);
            delete_environment_directory(dir);
            locked.map(|_| None)
        }
    }
}

/// Wait until `env` has no owner besides the caller
fn wait_for_sole_owner(env: &Arc<Environment>) -> bool {
    let deadline = Instant::now() + REOPEN_WAIT;
    while Arc::strong_count(env) > 1 {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

/// Delete a temporary environment directory and its contents
///
/// Only the first failure is reported.
fn delete_environment_directory(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Error deleting environment directory {}: {}", dir.display(), e);
            return;
        }
    };

    let mut error_reported = false;
    for entry in entries {
        let removed = entry.and_then(|entry| {
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            }
        });

        if let Err(e) = removed {
            if !error_reported {
                error_reported = true;
                tracing::warn!(
                    "Error deleting contents of environment directory {}: {}",
                    dir.display(),
                    e
                );
            }
        }
    }

    if let Err(e) = fs::remove_dir(dir) {
        if !error_reported {
            tracing::warn!("Error deleting environment directory {}: {}", dir.display(), e);
        }
    }
}
