//! Tests for DirectoryLock
//!
//! These tests verify:
//! - Exclusive ownership of a directory
//! - The lock note written into the lock file
//! - Release on unlock and on drop

use std::fs;

use binstore::env::{DirectoryLock, LOCK_FILE_NAME};
use binstore::ErrorKind;
use tempfile::TempDir;

// =============================================================================
// Acquire Tests
// =============================================================================

#[test]
fn test_lock_acquires_and_writes_note() {
    let temp_dir = TempDir::new().unwrap();
    let mut lock = DirectoryLock::new(temp_dir.path(), "owned by test");

    assert!(!lock.is_locked());
    assert!(lock.try_lock().unwrap());
    assert!(lock.is_locked());

    let lock_path = temp_dir.path().join(LOCK_FILE_NAME);
    assert_eq!(lock.lock_path(), lock_path);
    assert_eq!(fs::read_to_string(&lock_path).unwrap().trim(), "owned by test");
}

#[test]
fn test_lock_is_reentrant_for_same_instance() {
    let temp_dir = TempDir::new().unwrap();
    let mut lock = DirectoryLock::new(temp_dir.path(), "note");

    assert!(lock.try_lock().unwrap());
    assert!(lock.try_lock().unwrap());
}

#[test]
fn test_second_lock_on_same_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let mut first = DirectoryLock::new(temp_dir.path(), "first");
    let mut second = DirectoryLock::new(temp_dir.path(), "second");

    assert!(first.try_lock().unwrap());
    assert!(!second.try_lock().unwrap());
    assert!(!second.is_locked());

    // the loser must not clobber the owner's note
    let note = fs::read_to_string(first.lock_path()).unwrap();
    assert_eq!(note.trim(), "first");
}

#[test]
fn test_lock_in_missing_directory_is_setup_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut lock = DirectoryLock::new(temp_dir.path().join("missing"), "note");

    let err = lock.try_lock().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Setup);
}

// =============================================================================
// Release Tests
// =============================================================================

#[test]
fn test_unlock_releases_and_deletes_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut first = DirectoryLock::new(temp_dir.path(), "first");
    let mut second = DirectoryLock::new(temp_dir.path(), "second");

    assert!(first.try_lock().unwrap());
    assert!(first.try_unlock().unwrap());
    assert!(!first.is_locked());
    assert!(!temp_dir.path().join(LOCK_FILE_NAME).exists());

    assert!(second.try_lock().unwrap());
}

#[test]
fn test_unlock_without_lock_returns_false() {
    let temp_dir = TempDir::new().unwrap();
    let mut lock = DirectoryLock::new(temp_dir.path(), "note");

    assert!(!lock.try_unlock().unwrap());
}

#[test]
fn test_drop_releases_lock() {
    let temp_dir = TempDir::new().unwrap();

    {
        let mut lock = DirectoryLock::new(temp_dir.path(), "scoped");
        assert!(lock.try_lock().unwrap());
    }

    assert!(!temp_dir.path().join(LOCK_FILE_NAME).exists());
    let mut again = DirectoryLock::new(temp_dir.path(), "again");
    assert!(again.try_lock().unwrap());
}
