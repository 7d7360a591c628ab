//! The Goal Graph: an ordered collection of tasks with dependency edges.
//!
//! Validation never assumes the graph is well-formed; cycles and dangling
//! dependency ids are reported as issues, not panics.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::graph::task::{Task, TaskId, TaskStatus, UNASSIGNED};

/// A problem found by graph validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValidationIssue {
    /// A dependency id that references no task in the graph.
    MissingDependency { task: TaskId, dependency: TaskId },
    /// The task participates in a dependency cycle.
    Cycle { task: TaskId },
    /// The task is connected to nothing in a multi-task graph.
    Orphan { task: TaskId },
    /// Required attributes are blank.
    IncompleteAttributes { task: TaskId, missing: Vec<String> },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::MissingDependency { task, dependency } => {
                write!(f, "task {} depends on unknown task {}", task, dependency)
            }
            ValidationIssue::Cycle { task } => {
                write!(f, "task {} participates in a dependency cycle", task)
            }
            ValidationIssue::Orphan { task } => {
                write!(f, "task {} is not connected to the graph", task)
            }
            ValidationIssue::IncompleteAttributes { task, missing } => {
                write!(f, "task {} is missing: {}", task, missing.join(", "))
            }
        }
    }
}

/// The dependency graph of implementation tasks.
///
/// Task order is preserved as the planner produced it; status and owner on
/// the contained tasks are the single source of truth the scheduler
/// re-derives from on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GoalGraph {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl GoalGraph {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Ids of all tasks whose status is Completed.
    ///
    /// Derived fresh on every call; review/fix cycles mutate status between
    /// scheduler invocations, so this is never cached.
    pub fn completed_ids(&self) -> HashSet<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Whether every task has reached the terminal state.
    pub fn all_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    /// Count of tasks per status, for progress reporting.
    pub fn status_counts(&self) -> HashMap<TaskStatus, usize> {
        let mut counts = HashMap::new();
        for task in &self.tasks {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        counts
    }

    /// Fill missing attributes with defaults without overwriting present
    /// values: id from position, placeholder name/description, Medium
    /// priority, empty dependencies, NotStarted, Unassigned.
    pub fn normalize(&mut self) {
        for (index, task) in self.tasks.iter_mut().enumerate() {
            if task.id.is_empty() {
                task.id = TaskId::new((index + 1).to_string());
            }
            if task.name.is_empty() {
                task.name = format!("Task {}", task.id);
            }
            if task.description.is_empty() {
                task.description = "No description provided.".to_string();
            }
            if task.owner.is_empty() {
                task.owner = UNASSIGNED.to_string();
            }
            // priority, dependencies, and status already default via serde
        }
    }

    /// Validate the graph, reporting every issue found.
    ///
    /// Issue kinds: missing-dependency, cycle, orphan, incomplete-attributes.
    /// Every task participating in a cycle is reported exactly once.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let ids: HashSet<&TaskId> = self.tasks.iter().map(|t| &t.id).collect();

        // Dangling dependency ids.
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !ids.contains(dep) {
                    issues.push(ValidationIssue::MissingDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        issues.extend(self.cycle_members().into_iter().map(|task| ValidationIssue::Cycle { task }));

        // Orphans: no dependencies and no dependents, in a graph of more
        // than one task.
        if self.tasks.len() > 1 {
            let depended_on: HashSet<&TaskId> = self
                .tasks
                .iter()
                .flat_map(|t| t.dependencies.iter())
                .collect();
            for task in &self.tasks {
                if task.dependencies.is_empty() && !depended_on.contains(&task.id) {
                    issues.push(ValidationIssue::Orphan {
                        task: task.id.clone(),
                    });
                }
            }
        }

        // Blank required attributes.
        for task in &self.tasks {
            let mut missing = Vec::new();
            if task.id.is_empty() {
                missing.push("id".to_string());
            }
            if task.name.is_empty() {
                missing.push("name".to_string());
            }
            if task.description.is_empty() {
                missing.push("description".to_string());
            }
            if !missing.is_empty() {
                issues.push(ValidationIssue::IncompleteAttributes {
                    task: task.id.clone(),
                    missing,
                });
            }
        }

        issues
    }

    /// Every task that participates in a dependency cycle, each exactly once.
    ///
    /// Uses strongly-connected components: any SCC with more than one member
    /// is a cycle, as is a task depending on itself.
    fn cycle_members(&self) -> Vec<TaskId> {
        let mut graph: DiGraph<&TaskId, ()> = DiGraph::new();
        let mut indices: HashMap<&TaskId, NodeIndex> = HashMap::new();

        for task in &self.tasks {
            indices
                .entry(&task.id)
                .or_insert_with(|| graph.add_node(&task.id));
        }
        for task in &self.tasks {
            let to = indices[&task.id];
            for dep in &task.dependencies {
                if let Some(&from) = indices.get(dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut members = Vec::new();
        for component in tarjan_scc(&graph) {
            let in_cycle = component.len() > 1
                || component
                    .first()
                    .map(|&n| graph.find_edge(n, n).is_some())
                    .unwrap_or(false);
            if in_cycle {
                for node in component {
                    members.push(graph[node].clone());
                }
            }
        }

        // Deterministic output regardless of SCC discovery order.
        members.sort();
        members
    }
}
