//! Worker contract: the seam between the coordinator and its executors.
//!
//! Workers implement, review, fix, and verify tasks. What a worker actually
//! is (a language model, a human, a script) is outside this crate; the
//! coordinator only sees the trait and the structured reports. Every report
//! field carries a serde default, so a degraded or partially-formed result
//! normalizes to defaults instead of failing the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::graph::{GoalGraph, Task, ValidationIssue};

/// Unique identifier for a worker, stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    /// Create a new unique worker identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse role tag carried by each pool member.
///
/// Workers are interchangeable today; the tag is the attachment point for
/// capability-aware assignment if it is ever needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Coder,
    Reviewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Coder => write!(f, "coder"),
            Role::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// Outcome of one implementation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImplementationReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub files_modified: Vec<PathBuf>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// A single problem a reviewer raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Issue {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Outcome of a review pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReviewReport {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// Outcome of a fix pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FixReport {
    #[serde(default)]
    pub fixed_issues: Vec<Issue>,
    #[serde(default)]
    pub files_modified: Vec<PathBuf>,
}

/// Outcome of a verification pass over applied fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VerifyReport {
    #[serde(default)]
    pub all_fixed: bool,
    #[serde(default)]
    pub remaining_issues: Vec<Issue>,
}

/// An executor capable of implementing, reviewing, fixing, and verifying
/// tasks.
///
/// Implementations must not assume exclusive filesystem access beyond the
/// `file_access` list they are handed; the coordinator holds the matching
/// locks for exactly the duration of each call.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Implement a task, touching only the given files.
    async fn implement(&self, task: &Task, file_access: &[PathBuf]) -> ImplementationReport;

    /// Review an implementation against its task.
    async fn review(
        &self,
        task: &Task,
        report: &ImplementationReport,
        files: &[PathBuf],
    ) -> ReviewReport;

    /// Fix previously-raised issues, touching only the given files.
    async fn fix(&self, issues: &[Issue], file_access: &[PathBuf]) -> FixReport;

    /// Verify that a fix pass resolved the given issues.
    async fn verify(
        &self,
        task: &Task,
        issues: &[Issue],
        fix_report: &FixReport,
        files: &[PathBuf],
    ) -> VerifyReport;
}

/// External producer of Goal Graphs from a requirements document.
///
/// Graph generation and revision are language-model work outside this
/// crate; the coordinator invokes them through this seam and validates and
/// normalizes whatever comes back.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Derive a Goal Graph from a requirements document.
    async fn generate(&self, prd: &str) -> GoalGraph;

    /// Revise a Goal Graph in response to validation issues.
    async fn revise(&self, graph: &GoalGraph, issues: &[ValidationIssue]) -> GoalGraph;
}
