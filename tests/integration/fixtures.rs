//! Shared fixtures: scripted workers, a static planner, and graph builders.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use foreman::graph::{GoalGraph, Priority, Task, TaskId, ValidationIssue};
use foreman::pipeline::coordinator::AccessMap;
use foreman::worker::{
    FixReport, ImplementationReport, Issue, Planner, ReviewReport, VerifyReport, Worker,
};
use foreman::Config;

/// Worker that implements by echoing its file list, bounces the first
/// `rejections` reviews it is asked for, and always verifies fixes clean.
pub struct ScriptedWorker {
    rejections: usize,
    reviews: AtomicUsize,
    pub implementations: AtomicUsize,
}

impl ScriptedWorker {
    pub fn approving() -> Arc<Self> {
        Self::bouncing(0)
    }

    pub fn bouncing(rejections: usize) -> Arc<Self> {
        Arc::new(Self {
            rejections,
            reviews: AtomicUsize::new(0),
            implementations: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn implement(&self, _task: &Task, file_access: &[PathBuf]) -> ImplementationReport {
        self.implementations.fetch_add(1, Ordering::SeqCst);
        ImplementationReport {
            status: "implemented".to_string(),
            files_modified: file_access.to_vec(),
            notes: vec![],
        }
    }

    async fn review(
        &self,
        _task: &Task,
        _report: &ImplementationReport,
        _files: &[PathBuf],
    ) -> ReviewReport {
        let seen = self.reviews.fetch_add(1, Ordering::SeqCst);
        if seen < self.rejections {
            ReviewReport {
                approved: false,
                issues: vec![Issue {
                    kind: "correctness".to_string(),
                    description: "bounced by script".to_string(),
                    file: None,
                }],
            }
        } else {
            ReviewReport {
                approved: true,
                issues: vec![],
            }
        }
    }

    async fn fix(&self, issues: &[Issue], file_access: &[PathBuf]) -> FixReport {
        FixReport {
            fixed_issues: issues.to_vec(),
            files_modified: file_access.to_vec(),
        }
    }

    async fn verify(
        &self,
        _task: &Task,
        _issues: &[Issue],
        _fix: &FixReport,
        _files: &[PathBuf],
    ) -> VerifyReport {
        VerifyReport {
            all_fixed: true,
            remaining_issues: vec![],
        }
    }
}

/// Worker that returns bare defaults everywhere, simulating a degraded
/// executor whose output lost every optional field.
pub struct DegradedWorker;

#[async_trait]
impl Worker for DegradedWorker {
    async fn implement(&self, _task: &Task, _files: &[PathBuf]) -> ImplementationReport {
        ImplementationReport::default()
    }

    async fn review(
        &self,
        _task: &Task,
        _report: &ImplementationReport,
        _files: &[PathBuf],
    ) -> ReviewReport {
        // approved defaults to false: a degraded review bounces the task
        ReviewReport::default()
    }

    async fn fix(&self, _issues: &[Issue], _files: &[PathBuf]) -> FixReport {
        FixReport::default()
    }

    async fn verify(
        &self,
        _task: &Task,
        _issues: &[Issue],
        _fix: &FixReport,
        _files: &[PathBuf],
    ) -> VerifyReport {
        VerifyReport {
            all_fixed: true,
            ..Default::default()
        }
    }
}

/// Planner that hands back a fixed graph and revisions of it.
pub struct StaticPlanner {
    pub graph: GoalGraph,
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn generate(&self, _prd: &str) -> GoalGraph {
        self.graph.clone()
    }

    async fn revise(&self, graph: &GoalGraph, _issues: &[ValidationIssue]) -> GoalGraph {
        graph.clone()
    }
}

/// Config rooted in a temp directory.
pub fn test_config(dir: &TempDir) -> Config {
    Config {
        data_dir: Some(dir.path().to_string_lossy().to_string()),
        ..Default::default()
    }
}

/// Canonical fan-out: A free, B and C both depend on A.
pub fn fan_out_graph() -> GoalGraph {
    GoalGraph::new(vec![
        Task::new("A", "foundation").with_priority(Priority::High),
        Task::new("B", "api").with_dependencies(&["A"]),
        Task::new("C", "ui").with_dependencies(&["A"]),
    ])
}

/// One access-map entry per task, each a distinct file under the temp dir.
pub fn disjoint_access(dir: &TempDir, task_ids: &[&str]) -> AccessMap {
    let mut access = AccessMap::new();
    for id in task_ids {
        access.insert(
            TaskId::from(*id),
            vec![dir.path().join(format!("{}.rs", id.to_lowercase()))],
        );
    }
    access
}
