//! The lock manager: acquire, release, and inspect per-resource claims.
//!
//! Every resource maps to one JSON store under the lock directory, keyed by
//! a stable SHA-256 digest of the normalized absolute path. Record mutation
//! is a read-modify-write of the whole store under a lower-level gate file;
//! the rewritten store is fsynced and renamed into place before the call
//! returns, so readers never observe a partial write.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::lock::record::LockRecord;

/// Store content: literal resource path -> record.
type RecordMap = HashMap<String, LockRecord>;

/// Arbitrates access to shared filesystem resources across processes.
///
/// The manager itself holds no in-memory state beyond its configuration;
/// the lock directory is the single source of truth, which is what lets
/// independent processes arbitrate through it.
#[derive(Debug, Clone)]
pub struct LockManager {
    lock_dir: PathBuf,
    gate_retries: u32,
    gate_retry_delay: Duration,
}

impl LockManager {
    /// Create a manager rooted at the given lock directory.
    pub fn new(lock_dir: &Path) -> Self {
        Self {
            lock_dir: lock_dir.to_path_buf(),
            gate_retries: 5,
            gate_retry_delay: Duration::from_millis(20),
        }
    }

    /// Override the gate retry budget (attempts, delay between attempts).
    pub fn with_gate_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.gate_retries = retries;
        self.gate_retry_delay = delay;
        self
    }

    /// Acquire a lock on a resource.
    ///
    /// Fails with [`Error::Contention`] only when a live record held by a
    /// different owner exists and either side is exclusive. Expired records
    /// are overwritten silently; re-acquiring a resource the caller already
    /// holds renews the record.
    pub fn acquire(
        &self,
        resource: &Path,
        owner: &str,
        exclusive: bool,
        timeout_seconds: u64,
    ) -> Result<()> {
        let resource = normalize(resource);
        let key = resource.to_string_lossy().to_string();

        self.with_store(&resource, |records| {
            let now = Utc::now();
            if let Some(existing) = records.get(&key) {
                if existing.is_live(now) {
                    if existing.owner_id != owner && existing.conflicts_with(exclusive) {
                        return Err(Error::Contention {
                            resource: key.clone(),
                            holder: existing.owner_id.clone(),
                            expires_at: existing.expires_at(),
                        });
                    }
                } else {
                    info!(resource = %key, stale_owner = %existing.owner_id, "lock expired, taking over");
                }
            }

            records.insert(key.clone(), LockRecord::new(owner, timeout_seconds, exclusive));
            debug!(
                resource = %key,
                owner,
                exclusive,
                "lock acquired"
            );
            Ok(())
        })
    }

    /// Acquire a whole file-access list, all-or-nothing.
    ///
    /// Resources are claimed in sorted order; on the first failure every
    /// already-claimed member is released and the error is returned.
    pub fn acquire_set(
        &self,
        resources: &[PathBuf],
        owner: &str,
        exclusive: bool,
        timeout_seconds: u64,
    ) -> Result<()> {
        let mut ordered: Vec<PathBuf> = resources.iter().map(|p| normalize(p)).collect();
        ordered.sort();
        ordered.dedup();

        let mut held: Vec<&PathBuf> = Vec::new();
        for resource in &ordered {
            match self.acquire(resource, owner, exclusive, timeout_seconds) {
                Ok(()) => held.push(resource),
                Err(err) => {
                    for acquired in held {
                        let _ = self.release(acquired, owner);
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Release a lock held by `owner`.
    ///
    /// Returns `true` when the record was removed or was already absent;
    /// `false` when a live record belongs to someone else.
    pub fn release(&self, resource: &Path, owner: &str) -> Result<bool> {
        let resource = normalize(resource);
        let key = resource.to_string_lossy().to_string();

        self.with_store(&resource, |records| {
            match records.get(&key) {
                Some(record) if record.owner_id == owner => {
                    records.remove(&key);
                    debug!(resource = %key, owner, "lock released");
                    Ok(true)
                }
                Some(record) => {
                    warn!(
                        resource = %key,
                        owner,
                        holder = %record.owner_id,
                        "refusing to release foreign lock"
                    );
                    Ok(false)
                }
                // Releasing an absent record is a no-op success.
                None => Ok(true),
            }
        })
    }

    /// Release every resource in a file-access list.
    pub fn release_set(&self, resources: &[PathBuf], owner: &str) -> Result<()> {
        for resource in resources {
            self.release(resource, owner)?;
        }
        Ok(())
    }

    /// Check whether a resource is held by a live record.
    ///
    /// With `by_owner`, additionally requires the record to belong to that
    /// owner. Unreadable or corrupt stores read as unlocked.
    pub fn is_locked(&self, resource: &Path, by_owner: Option<&str>) -> bool {
        let resource = normalize(resource);
        let key = resource.to_string_lossy().to_string();

        let records = match self.read_store(&self.store_path(&resource)) {
            Some(records) => records,
            None => return false,
        };

        match records.get(&key) {
            Some(record) if record.is_live(Utc::now()) => {
                by_owner.map_or(true, |owner| record.owner_id == owner)
            }
            _ => false,
        }
    }

    /// All live records across the lock directory, keyed by resource path.
    ///
    /// Expired and unparsable entries are skipped.
    pub fn active_locks(&self) -> HashMap<PathBuf, LockRecord> {
        let mut active = HashMap::new();
        let entries = match fs::read_dir(&self.lock_dir) {
            Ok(entries) => entries,
            Err(_) => return active,
        };

        let now = Utc::now();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            let Some(records) = self.read_store(&path) else {
                continue;
            };
            for (resource, record) in records {
                if record.is_live(now) {
                    active.insert(PathBuf::from(resource), record);
                }
            }
        }
        active
    }

    // ---- record store plumbing ----

    /// Stable store path for a resource: SHA-256 of the normalized absolute
    /// path, hex-truncated. Survives process restarts, unlike a language
    /// identity hash.
    fn store_path(&self, resource: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(resource.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        self.lock_dir
            .join(format!("{}.lock", hex::encode(&digest[..8])))
    }

    /// Read-modify-write of the full record store under the gate.
    fn with_store<T>(
        &self,
        resource: &Path,
        mutate: impl FnOnce(&mut RecordMap) -> Result<T>,
    ) -> Result<T> {
        fs::create_dir_all(&self.lock_dir)?;
        let store = self.store_path(resource);
        let _gate = self.enter_gate(&store, resource)?;

        let mut records = self.read_store(&store).unwrap_or_default();
        let outcome = mutate(&mut records)?;
        self.write_store(&store, &records)?;
        Ok(outcome)
    }

    /// Enter the lower-level gate guarding a store file.
    ///
    /// The gate is a `create_new` sibling file; holding it is single-writer
    /// discipline over the store. Contention here is a transient busy
    /// condition, retried internally and surfaced as [`Error::LockBusy`]
    /// only once the retry budget is spent. A gate left behind by a crashed
    /// process is broken after [`STALE_GATE_SECS`]; the critical section it
    /// guards is a single store rewrite, never that long.
    fn enter_gate(&self, store: &Path, resource: &Path) -> Result<GateGuard> {
        let gate = store.with_extension("gate");
        for attempt in 0..=self.gate_retries {
            match OpenOptions::new().write(true).create_new(true).open(&gate) {
                Ok(_) => return Ok(GateGuard { path: gate }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if gate_is_stale(&gate) {
                        warn!(resource = %resource.display(), "breaking stale lock store gate");
                        let _ = fs::remove_file(&gate);
                        continue;
                    }
                    debug!(
                        resource = %resource.display(),
                        attempt,
                        "lock store gate busy"
                    );
                    std::thread::sleep(self.gate_retry_delay);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(Error::LockBusy {
            resource: resource.to_string_lossy().to_string(),
        })
    }

    /// Parse a store file. Missing files and corrupt content both decay to
    /// `None`; corruption is logged and will be overwritten by the next
    /// mutation.
    fn read_store(&self, store: &Path) -> Option<RecordMap> {
        let contents = fs::read_to_string(store).ok()?;
        match serde_json::from_str(&contents) {
            Ok(records) => Some(records),
            Err(err) => {
                warn!(store = %store.display(), %err, "corrupt lock store, treating as empty");
                None
            }
        }
    }

    /// Write the store synchronously: temp file, fsync, rename.
    fn write_store(&self, store: &Path, records: &RecordMap) -> Result<()> {
        let tmp = store.with_extension("lock.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(serde_json::to_string_pretty(records)?.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, store)?;
        Ok(())
    }
}

/// Age past which a gate file is considered abandoned by a dead process.
const STALE_GATE_SECS: u64 = 5;

/// A gate whose file is older than [`STALE_GATE_SECS`] belongs to nobody.
fn gate_is_stale(gate: &Path) -> bool {
    fs::metadata(gate)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age.as_secs() >= STALE_GATE_SECS)
        .unwrap_or(false)
}

/// Removes the gate file when the store mutation finishes, error or not.
struct GateGuard {
    path: PathBuf,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Normalize a path to an absolute, lexically-cleaned form.
///
/// Does not touch the filesystem: locked resources may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}
