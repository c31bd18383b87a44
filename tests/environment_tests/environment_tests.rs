//! Tests for EnvironmentHolder and ShutdownRegistry
//!
//! These tests verify:
//! - Temporary environments in random directories, deleted on close
//! - Persistent environments locked against a second owner
//! - Setup errors for unusable directories and parameters
//! - Closing tracked databases and pruning empty persistent ones
//! - Orderly shutdown through the registry

use std::fs;
use std::path::Path;
use std::sync::Arc;

use binstore::engine::{Database, Environment, OperationStatus};
use binstore::env::{EnvironmentHolder, ShutdownRegistry, ENVIRONMENT_NAME_PREFIX, LOCK_FILE_NAME};
use binstore::{BinStoreError, EnvironmentConfig, ErrorKind, StoreManagerConfig};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn env_config(parent: &Path, temporary: bool) -> EnvironmentConfig {
    let config = StoreManagerConfig::builder()
        .parent_dir(parent)
        .param("lmdb.map_size", "16777216")
        .build();
    EnvironmentConfig::new(&config, temporary)
}

fn open_holder(parent: &Path, temporary: bool) -> (Arc<ShutdownRegistry>, Arc<EnvironmentHolder>) {
    let registry = Arc::new(ShutdownRegistry::new());
    let holder = EnvironmentHolder::open(&env_config(parent, temporary), &registry).unwrap();
    (registry, holder)
}

fn open_tracked(holder: &EnvironmentHolder, name: &str) -> Arc<Database> {
    let db = Arc::new(holder.environment().unwrap().open_database(name).unwrap());
    holder.track_database(&db);
    db
}

fn child_dirs(parent: &Path) -> Vec<String> {
    fs::read_dir(parent)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Temporary Environment Tests
// =============================================================================

#[test]
fn test_temporary_environment_uses_random_child_directory() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);

    let env_dir = holder.env_dir().unwrap();
    assert_eq!(env_dir.parent().unwrap(), temp_dir.path());
    assert!(env_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(ENVIRONMENT_NAME_PREFIX));
    assert!(env_dir.join(LOCK_FILE_NAME).exists());
}

#[test]
fn test_temporary_environments_never_share_directory() {
    let temp_dir = TempDir::new().unwrap();
    let (_r1, first) = open_holder(temp_dir.path(), true);
    let (_r2, second) = open_holder(temp_dir.path(), true);

    assert_ne!(first.env_dir().unwrap(), second.env_dir().unwrap());
    assert_eq!(child_dirs(temp_dir.path()).len(), 2);
}

#[test]
fn test_temporary_directory_deleted_on_close() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);
    let env_dir = holder.env_dir().unwrap();

    let db = open_tracked(&holder, "scratch");
    let env = holder.environment().unwrap();
    assert_eq!(env.put(&db, b"k", b"v").unwrap(), OperationStatus::Success);
    drop(env);

    holder.close_environment(true);

    assert!(holder.is_closed());
    assert!(!env_dir.exists());
    assert!(holder.env_dir().is_none());
}

#[test]
fn test_close_environment_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);

    holder.close_environment(true);
    holder.close_environment(true);
    holder.close_environment(false);

    assert!(child_dirs(temp_dir.path()).is_empty());
}

// =============================================================================
// Persistent Environment Tests
// =============================================================================

#[test]
fn test_persistent_environment_lives_in_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("orders");
    let (_registry, holder) = open_holder(&dir, false);

    assert_eq!(holder.env_dir().unwrap(), dir);
    assert!(dir.join(LOCK_FILE_NAME).exists());

    holder.close_environment(true);
    assert!(dir.exists());
    assert!(!dir.join(LOCK_FILE_NAME).exists());
}

#[test]
fn test_second_persistent_owner_fails_without_harming_first() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, first) = open_holder(temp_dir.path(), false);
    let db = open_tracked(&first, "orders");

    let registry = Arc::new(ShutdownRegistry::new());
    let err = EnvironmentHolder::open(&env_config(temp_dir.path(), false), &registry).unwrap_err();

    assert!(matches!(err, BinStoreError::DirectoryLocked(_)));
    assert!(err.is_setup());
    assert_eq!(registry.live_count(), 0);

    let env = first.environment().unwrap();
    assert_eq!(env.put(&db, b"o1", b"payload").unwrap(), OperationStatus::Success);
    assert_eq!(env.get(&db, b"o1").unwrap().1, Some(b"payload".to_vec()));
}

#[test]
fn test_persistent_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let (_registry, holder) = open_holder(temp_dir.path(), false);
        let db = open_tracked(&holder, "orders");
        holder.environment().unwrap().put(&db, b"o1", b"payload").unwrap();
        holder.close_environment(true);
    }

    let (_registry, holder) = open_holder(temp_dir.path(), false);
    let db = open_tracked(&holder, "orders");
    let (status, value) = holder.environment().unwrap().get(&db, b"o1").unwrap();

    assert_eq!(status, OperationStatus::Success);
    assert_eq!(value, Some(b"payload".to_vec()));
}

#[test]
fn test_persistent_close_prunes_only_empty_databases() {
    let temp_dir = TempDir::new().unwrap();

    {
        let (_registry, holder) = open_holder(temp_dir.path(), false);
        let full = open_tracked(&holder, "full");
        let _empty = open_tracked(&holder, "empty");
        holder.environment().unwrap().put(&full, b"k", b"v").unwrap();

        let mut names = holder.environment().unwrap().database_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["empty".to_string(), "full".to_string()]);

        holder.close_environment(true);
    }

    let (_registry, holder) = open_holder(temp_dir.path(), false);
    let names = holder.environment().unwrap().database_names().unwrap();
    assert_eq!(names, vec!["full".to_string()]);
}

// =============================================================================
// Setup Error Tests
// =============================================================================

#[test]
fn test_parent_directory_that_is_a_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("not_a_dir");
    fs::write(&file, b"x").unwrap();

    let registry = Arc::new(ShutdownRegistry::new());
    let err = EnvironmentHolder::open(&env_config(&file, true), &registry).unwrap_err();

    assert!(matches!(err, BinStoreError::DirectoryIsFile(_)));
    assert_eq!(err.kind(), ErrorKind::Setup);
}

#[test]
fn test_invalid_engine_parameter_fails_setup() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreManagerConfig::builder()
        .parent_dir(temp_dir.path())
        .param("binstore.lmdb.max_dbs", "plenty")
        .build();

    let registry = Arc::new(ShutdownRegistry::new());
    let err = EnvironmentHolder::open(&EnvironmentConfig::new(&config, true), &registry).unwrap_err();

    assert!(matches!(err, BinStoreError::Config(_)));
    assert!(err.is_setup());
    assert!(child_dirs(temp_dir.path()).is_empty());
}

#[test]
fn test_foreign_parameters_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreManagerConfig::builder()
        .parent_dir(temp_dir.path())
        .param("cache.eviction", "lru")
        .param("lmdb.max_readers", "32")
        .build();

    let registry = Arc::new(ShutdownRegistry::new());
    let holder = EnvironmentHolder::open(&EnvironmentConfig::new(&config, true), &registry).unwrap();

    assert_eq!(holder.tuning().max_readers, 32);
}

// =============================================================================
// Database Tracking Tests
// =============================================================================

#[test]
fn test_close_environment_closes_tracked_databases() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);
    let first = open_tracked(&holder, "a");
    let second = open_tracked(&holder, "b");
    assert_eq!(holder.tracked_count(), 2);

    holder.close_environment(true);

    assert!(first.is_closed());
    assert!(second.is_closed());
    assert_eq!(holder.tracked_count(), 0);
}

#[test]
fn test_forget_database_stops_tracking() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);
    let db = open_tracked(&holder, "a");

    assert!(holder.is_name_tracked("a"));
    holder.forget_database(&db);
    assert!(!holder.is_name_tracked("a"));

    holder.close_environment(true);
    assert!(!db.is_closed());
}

#[test]
fn test_use_after_close_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);
    let db = open_tracked(&holder, "a");
    let env = holder.environment().unwrap();

    holder.close_environment(true);

    assert_eq!(holder.environment().unwrap_err().kind(), ErrorKind::UseAfterClose);
    assert_eq!(env.get(&db, b"k").unwrap_err().kind(), ErrorKind::UseAfterClose);
}

#[test]
fn test_only_engine_panic_needs_reopen() {
    assert!(Environment::needs_reopen(&lmdb::Error::Panic));
    assert!(!Environment::needs_reopen(&lmdb::Error::NotFound));
    assert!(!Environment::needs_reopen(&lmdb::Error::MapFull));
}

#[test]
fn test_display_names_parent_and_params() {
    let temp_dir = TempDir::new().unwrap();
    let (_registry, holder) = open_holder(temp_dir.path(), true);

    let text = holder.to_string();
    assert!(text.starts_with("EnvironmentHolder { Parent: "));
    assert!(text.contains("Temporary: true"));
    assert!(text.contains("lmdb.map_size"));
}

// =============================================================================
// Shutdown Registry Tests
// =============================================================================

#[test]
fn test_registry_shutdown_closes_every_environment() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(ShutdownRegistry::new());
    let config = env_config(temp_dir.path(), true);

    let first = EnvironmentHolder::open(&config, &registry).unwrap();
    let second = EnvironmentHolder::open(&config, &registry).unwrap();
    assert_eq!(registry.live_count(), 2);

    registry.shutdown();

    assert!(first.is_closed());
    assert!(second.is_closed());
    assert_eq!(registry.live_count(), 0);
    assert!(child_dirs(temp_dir.path()).is_empty());
}

#[test]
fn test_close_environment_deregisters() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, holder) = open_holder(temp_dir.path(), true);
    assert_eq!(registry.live_count(), 1);

    holder.close_environment(true);

    assert_eq!(registry.live_count(), 0);
}

#[test]
fn test_dropping_registry_closes_environments() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, holder) = open_holder(temp_dir.path(), true);

    drop(registry);

    assert!(holder.is_closed());
    assert!(child_dirs(temp_dir.path()).is_empty());
}

#[test]
fn test_registry_does_not_keep_environments_alive() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, holder) = open_holder(temp_dir.path(), true);

    drop(holder);

    assert_eq!(registry.live_count(), 0);
    assert!(child_dirs(temp_dir.path()).is_empty());
}
