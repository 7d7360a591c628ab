//! foreman - task coordination engine for a pool of interchangeable workers.
//!
//! The crate pairs a stateful scheduler over a dependency graph of tasks
//! (the Goal Graph) with a crash-tolerant advisory lock manager arbitrating
//! concurrent file access, sequenced by an explicit pipeline state machine.
//! What a worker actually is lives behind the [`worker::Worker`] trait.

pub mod config;
pub mod error;
pub mod graph;
pub mod lock;
pub mod pipeline;
pub mod sched;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use graph::{GoalGraph, GraphStore, Priority, Task, TaskId, TaskStatus, ValidationIssue};
pub use lock::{LockManager, LockRecord};
pub use pipeline::{Coordinator, PipelineState, ProjectSummary, Stage};
pub use sched::{assign, ready_set, WorkerPool};
pub use worker::{Planner, Worker, WorkerId};
