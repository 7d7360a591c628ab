//! Ready-set computation, assignment, and the worker pool registry.

pub mod pool;
pub mod scheduler;

pub use pool::{WorkerHandle, WorkerPool};
pub use scheduler::{assign, ready_set, Assignments};
