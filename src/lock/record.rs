//! Lock record data model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A persisted claim of ownership over a resource.
///
/// A record is live until `time + timeout_seconds`; past that instant it is
/// reclaimable by any party and carries no authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identifier of the owner holding the claim.
    pub owner_id: String,
    /// When the claim was acquired (or last renewed).
    pub time: DateTime<Utc>,
    /// Seconds until the claim expires without renewal.
    pub timeout_seconds: u64,
    /// Whether the claim is exclusive (write) or shared (read).
    pub exclusive: bool,
}

impl LockRecord {
    /// Create a record acquired now.
    pub fn new(owner_id: &str, timeout_seconds: u64, exclusive: bool) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            time: Utc::now(),
            timeout_seconds,
            exclusive,
        }
    }

    /// The instant this record stops being live.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.time + Duration::seconds(self.timeout_seconds as i64)
    }

    /// A record is live iff `now < time + timeout`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// Whether a new request in the given mode conflicts with this record.
    ///
    /// Shared/shared is compatible; anything touching exclusive conflicts.
    pub fn conflicts_with(&self, exclusive: bool) -> bool {
        exclusive || self.exclusive
    }
}
