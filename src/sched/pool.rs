//! Worker pool registry.
//!
//! The pool tracks identity and current assignment for each worker and
//! nothing else; the executors themselves live behind the [`Worker`]
//! trait. Checkout/checkin enforce the at-most-one-assignment invariant.
//!
//! [`Worker`]: crate::worker::Worker

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::TaskId;
use crate::worker::{Role, WorkerId};

/// One pool member: identity, role tag, and what it is working on now.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub role: Role,
    pub current_task: Option<TaskId>,
}

impl WorkerHandle {
    pub fn new(id: WorkerId, role: Role) -> Self {
        Self {
            id,
            role,
            current_task: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_task.is_none()
    }
}

/// Registry of interchangeable workers.
///
/// Order is registration order; round-robin distribution relies on it.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    handles: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Create a pool of `count` fresh workers with the given role.
    pub fn with_workers(count: usize, role: Role) -> Self {
        let handles = (0..count)
            .map(|_| WorkerHandle::new(WorkerId::new(), role))
            .collect();
        Self { handles }
    }

    /// Register one more worker, returning its id.
    pub fn register(&mut self, role: Role) -> WorkerId {
        let id = WorkerId::new();
        self.handles.push(WorkerHandle::new(id, role));
        id
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Worker ids in registration order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.handles.iter().map(|h| h.id).collect()
    }

    pub fn get(&self, id: &WorkerId) -> Option<&WorkerHandle> {
        self.handles.iter().find(|h| &h.id == id)
    }

    fn get_mut(&mut self, id: &WorkerId) -> Option<&mut WorkerHandle> {
        self.handles.iter_mut().find(|h| &h.id == id)
    }

    /// Mark a worker as executing a task.
    ///
    /// Fails loudly on double-checkout: a worker holds at most one current
    /// assignment.
    pub fn checkout(&mut self, id: &WorkerId, task: &TaskId) -> Result<()> {
        let handle = self
            .get_mut(id)
            .ok_or_else(|| Error::WorkerNotFound(id.to_string()))?;
        if let Some(current) = &handle.current_task {
            return Err(Error::WorkerOccupied {
                worker: id.to_string(),
                task: current.to_string(),
            });
        }
        handle.current_task = Some(task.clone());
        Ok(())
    }

    /// Clear a worker's current assignment, returning what it was.
    pub fn checkin(&mut self, id: &WorkerId) -> Result<Option<TaskId>> {
        let handle = self
            .get_mut(id)
            .ok_or_else(|| Error::WorkerNotFound(id.to_string()))?;
        Ok(handle.current_task.take())
    }

    /// Workers with no current assignment, in registration order.
    pub fn idle(&self) -> Vec<WorkerId> {
        self.handles
            .iter()
            .filter(|h| h.is_idle())
            .map(|h| h.id)
            .collect()
    }

    /// Pick a worker other than `owner` when the pool allows it.
    ///
    /// Review and verify passes go to a different pair of eyes than the
    /// task owner whenever the pool has more than one member.
    pub fn peer_of(&self, owner: &str) -> Option<WorkerId> {
        self.handles
            .iter()
            .find(|h| h.id.to_string() != owner)
            .or_else(|| self.handles.first())
            .map(|h| h.id)
    }

    /// Current assignments, for inspection.
    pub fn assignments(&self) -> HashMap<WorkerId, TaskId> {
        self.handles
            .iter()
            .filter_map(|h| h.current_task.clone().map(|t| (h.id, t)))
            .collect()
    }
}
