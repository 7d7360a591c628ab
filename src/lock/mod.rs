//! Advisory file locking with expiry-based crash recovery.
//!
//! Locks are persisted claims over filesystem resources. A claim that is
//! never released stops mattering once its timeout elapses, which is the
//! only recovery path for a worker that dies mid-task.

pub mod manager;
pub mod record;

pub use manager::LockManager;
pub use record::LockRecord;
