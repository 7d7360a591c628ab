//! Ready-set computation and round-robin assignment.
//!
//! The scheduler is stateless: status and owner on the Goal Graph are the
//! single source of truth, re-derived on every call, because review/fix
//! cycles mutate status between invocations.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::graph::{GoalGraph, Task, TaskId};
use crate::sched::pool::WorkerPool;
use crate::worker::WorkerId;

/// Assignment plan: worker id -> task ids, in dispatch order.
pub type Assignments = HashMap<WorkerId, Vec<TaskId>>;

/// Tasks eligible for work.
///
/// A task qualifies iff its status is neither InProgress nor Completed and
/// every dependency id is in `completed` (an empty dependency list is
/// trivially satisfied).
pub fn ready_set<'a>(graph: &'a GoalGraph, completed: &HashSet<TaskId>) -> Vec<&'a Task> {
    graph
        .tasks
        .iter()
        .filter(|task| {
            !matches!(
                task.status,
                crate::graph::TaskStatus::InProgress | crate::graph::TaskStatus::Completed
            )
        })
        .filter(|task| task.dependencies.iter().all(|dep| completed.contains(dep)))
        .collect()
}

/// Assign ready tasks to workers round-robin.
///
/// Ready tasks are sorted by priority rank (High > Medium > Low), then by
/// descending dependency count, then distributed across the pool in
/// registration order. Each assigned task transitions
/// NotStarted/NeedsFixes → InProgress with its owner set; tasks in any
/// other status are left alone, which makes repeated calls with no
/// intervening state change no-ops.
pub fn assign(graph: &mut GoalGraph, pool: &WorkerPool) -> Assignments {
    let workers = pool.ids();
    let mut assignments: Assignments = workers.iter().map(|id| (*id, Vec::new())).collect();
    if workers.is_empty() {
        return assignments;
    }

    let completed = graph.completed_ids();
    let mut candidates: Vec<TaskId> = ready_set(graph, &completed)
        .into_iter()
        .filter(|task| task.status.is_assignable())
        .map(|task| task.id.clone())
        .collect();

    // Stable sort keeps planner order for full ties.
    candidates.sort_by(|a, b| {
        let ta = graph.get(a).map(|t| (t.priority.rank(), t.dependencies.len()));
        let tb = graph.get(b).map(|t| (t.priority.rank(), t.dependencies.len()));
        tb.cmp(&ta)
    });

    for (index, task_id) in candidates.iter().enumerate() {
        let worker = workers[index % workers.len()];
        if let Some(task) = graph.get_mut(task_id) {
            task.assign_to(&worker.to_string());
            debug!(task = %task_id, worker = %worker.short(), "task assigned");
        }
        if let Some(queue) = assignments.get_mut(&worker) {
            queue.push(task_id.clone());
        }
    }

    let assigned: usize = assignments.values().map(Vec::len).sum();
    if assigned > 0 {
        info!(tasks = assigned, workers = workers.len(), "assignment round complete");
    }
    assignments
}
