//! End-of-run project summary.
//!
//! The summary is structured data derived from the Goal Graph; rendering
//! it into prose is an external concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::graph::{GoalGraph, TaskId, TaskStatus};

/// Structured report produced when the pipeline reaches its final stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// When the summary was generated.
    pub generated_at: DateTime<Utc>,
    /// Total number of tasks in the graph.
    pub total_tasks: usize,
    /// Ids of tasks that reached the terminal state, in graph order.
    pub completed_tasks: Vec<TaskId>,
    /// Ids of tasks that did not complete, in graph order.
    pub unfinished_tasks: Vec<TaskId>,
    /// Every file any worker reported modifying, deduplicated and sorted.
    pub files_modified: Vec<PathBuf>,
}

impl ProjectSummary {
    /// Build a summary from the final graph and the accumulated file set.
    pub fn from_graph(graph: &GoalGraph, files_modified: &BTreeSet<PathBuf>) -> Self {
        let completed_tasks: Vec<TaskId> = graph
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();
        let unfinished_tasks: Vec<TaskId> = graph
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();

        Self {
            generated_at: Utc::now(),
            total_tasks: graph.len(),
            completed_tasks,
            unfinished_tasks,
            files_modified: files_modified.iter().cloned().collect(),
        }
    }

    /// Whether every task completed.
    pub fn is_fully_complete(&self) -> bool {
        self.unfinished_tasks.is_empty()
    }
}
