//! Task data model for the Goal Graph.
//!
//! Tasks are the atomic units of work assigned to workers. Ids are plain
//! strings: the graph arrives from an external planner and its ids are
//! whatever that planner chose.

use serde::{Deserialize, Serialize};

/// Owner value for a task nobody has claimed yet.
pub const UNASSIGNED: &str = "Unassigned";

/// Unique identifier for a task within a Goal Graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Importance level used for assignment ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank for sorting: High > Medium > Low.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

/// Task status in its lifecycle.
///
/// Serialized in the human-readable form the persisted graph format uses
/// ("Not Started", "In Progress", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Needs Review")]
    NeedsReview,
    #[serde(rename = "Needs Fixes")]
    NeedsFixes,
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    /// Completed is the only terminal state; tasks are never deleted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Statuses the scheduler may transition to InProgress.
    pub fn is_assignable(&self) -> bool {
        matches!(self, TaskStatus::NotStarted | TaskStatus::NeedsFixes)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::NotStarted => write!(f, "Not Started"),
            TaskStatus::InProgress => write!(f, "In Progress"),
            TaskStatus::NeedsReview => write!(f, "Needs Review"),
            TaskStatus::NeedsFixes => write!(f, "Needs Fixes"),
            TaskStatus::Completed => write!(f, "Completed"),
        }
    }
}

fn default_owner() -> String {
    UNASSIGNED.to_string()
}

/// A single task in the Goal Graph.
///
/// Every field beyond the id carries a serde default so that graphs produced
/// by an external planner with attributes missing still deserialize; the
/// store's `normalize` pass fills the gaps explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: TaskId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Task {
    /// Create a task with defaults for everything but id and name.
    pub fn new(id: impl Into<TaskId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            priority: Priority::default(),
            description: String::new(),
            dependencies: Vec::new(),
            status: TaskStatus::default(),
            owner: default_owner(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| TaskId::from(*d)).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Assign the task: status becomes InProgress, owner is recorded.
    pub fn assign_to(&mut self, owner: &str) {
        self.status = TaskStatus::InProgress;
        self.owner = owner.to_string();
    }

    pub fn is_unassigned(&self) -> bool {
        self.owner == UNASSIGNED
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
