//! Cross-owner lock arbitration tests.
//!
//! These cover the cross-process lock properties: exclusive contention,
//! shared compatibility, expiry-based takeover, and persistence of the
//! record store across manager instances (simulating process restarts).

use chrono::{Duration as ChronoDuration, Utc};
use std::fs;
use tempfile::TempDir;

use foreman::lock::LockManager;
use foreman::Error;

/// Test: exclusive holder blocks a second owner until release.
/// Given O1 holds a live exclusive lock on R
/// When O2 acquires R in either mode
/// Then contention is raised until O1 releases
#[test]
fn test_exclusive_lock_blocks_until_release() {
    let dir = TempDir::new().unwrap();
    let manager = LockManager::new(dir.path());
    let resource = dir.path().join("src/shared.rs");

    manager.acquire(&resource, "owner-1", true, 30).unwrap();

    assert!(matches!(
        manager.acquire(&resource, "owner-2", true, 30),
        Err(Error::Contention { .. })
    ));
    assert!(matches!(
        manager.acquire(&resource, "owner-2", false, 30),
        Err(Error::Contention { .. })
    ));

    assert!(manager.release(&resource, "owner-1").unwrap());
    manager.acquire(&resource, "owner-2", true, 30).unwrap();
    assert!(manager.is_locked(&resource, Some("owner-2")));
}

/// Test: two shared holders never conflict.
#[test]
fn test_shared_holders_coexist() {
    let dir = TempDir::new().unwrap();
    let manager = LockManager::new(dir.path());
    let resource = dir.path().join("README.md");

    manager.acquire(&resource, "reader-1", false, 30).unwrap();
    manager.acquire(&resource, "reader-2", false, 30).unwrap();
}

/// Test: timeout expiry makes the resource reclaimable by any party.
/// Given a lock acquired with timeout=30s
/// When 31 seconds have passed
/// Then a second owner's acquire succeeds and the record shows the new owner
#[test]
fn test_expired_lock_reclaimed_by_new_owner() {
    let dir = TempDir::new().unwrap();
    let manager = LockManager::new(dir.path());
    let resource = dir.path().join("src/wedged.rs");

    manager.acquire(&resource, "crashed-worker", true, 30).unwrap();
    age_all_records(dir.path(), 31);

    manager.acquire(&resource, "survivor", true, 30).unwrap();

    let active = manager.active_locks();
    let record = active.values().next().unwrap();
    assert_eq!(record.owner_id, "survivor");
}

/// Test: a lock store survives across manager instances.
///
/// The store key is a stable hash of the path, so a manager created after
/// a process restart still finds the previous process's records.
#[test]
fn test_locks_visible_across_process_restart() {
    let dir = TempDir::new().unwrap();
    let resource = dir.path().join("src/lib.rs");

    {
        let manager = LockManager::new(dir.path());
        manager.acquire(&resource, "process-1", true, 30).unwrap();
    }

    let manager = LockManager::new(dir.path());
    assert!(manager.is_locked(&resource, Some("process-1")));
    assert!(matches!(
        manager.acquire(&resource, "process-2", true, 30),
        Err(Error::Contention { .. })
    ));
}

/// Test: distinct resources never contend.
#[test]
fn test_disjoint_resources_do_not_contend() {
    let dir = TempDir::new().unwrap();
    let manager = LockManager::new(dir.path());

    manager
        .acquire(&dir.path().join("a.rs"), "owner-1", true, 30)
        .unwrap();
    manager
        .acquire(&dir.path().join("b.rs"), "owner-2", true, 30)
        .unwrap();

    assert_eq!(manager.active_locks().len(), 2);
}

/// Test: releasing someone else's live lock is refused, not an error.
#[test]
fn test_foreign_release_refused() {
    let dir = TempDir::new().unwrap();
    let manager = LockManager::new(dir.path());
    let resource = dir.path().join("a.rs");

    manager.acquire(&resource, "owner-1", true, 30).unwrap();
    assert!(!manager.release(&resource, "owner-2").unwrap());
    assert!(manager.is_locked(&resource, Some("owner-1")));
}

/// Rewrite every record in every store so it looks `age_secs` old.
fn age_all_records(lock_dir: &std::path::Path, age_secs: i64) {
    for entry in fs::read_dir(lock_dir).unwrap().flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }
        let mut records: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let backdated = (Utc::now() - ChronoDuration::seconds(age_secs)).to_rfc3339();
        for record in records.as_object_mut().unwrap().values_mut() {
            record["time"] = serde_json::Value::String(backdated.clone());
        }
        fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();
    }
}
