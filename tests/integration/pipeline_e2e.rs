//! Full pipeline runs with scripted in-process workers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

use foreman::graph::{GoalGraph, GraphStore, PrdStore, Task, TaskId, TaskStatus};
use foreman::pipeline::Coordinator;
use foreman::worker::Worker;
use foreman::{Error, Stage};

use crate::fixtures::{
    disjoint_access, fan_out_graph, test_config, DegradedWorker, ScriptedWorker, StaticPlanner,
};

/// Test: happy path from requirements to summary.
/// Given a 3-task fan-out graph and 2 approving workers
/// When the full pipeline runs
/// Then every task completes, locks are drained, and the summary is full
#[tokio::test]
async fn test_pipeline_happy_path() {
    let dir = TempDir::new().unwrap();
    let scripted = ScriptedWorker::approving();
    let workers: Vec<Arc<dyn Worker>> = vec![scripted.clone(), ScriptedWorker::approving()];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();
    let planner = StaticPlanner {
        graph: fan_out_graph(),
    };

    coordinator.record_prd("# Build a web app").unwrap();
    assert_eq!(coordinator.stage(), Stage::PrdReady);

    coordinator.build_graph(&planner).await.unwrap();
    let issues = coordinator.validate_graph().unwrap();
    assert!(issues.is_empty());
    coordinator.approve(true, &planner).await.unwrap();

    coordinator
        .execute(&disjoint_access(&dir, &["A", "B", "C"]))
        .await
        .unwrap();
    assert!(coordinator.graph().all_complete());
    assert!(coordinator.locks().active_locks().is_empty());

    let summary = coordinator.summarize().unwrap();
    assert!(summary.is_fully_complete());
    assert_eq!(summary.completed_tasks.len(), 3);
    assert_eq!(summary.files_modified.len(), 3);
    assert_eq!(coordinator.stage(), Stage::Summarized);

    // Some worker actually implemented something.
    assert!(scripted.implementations.load(Ordering::SeqCst) >= 1);
}

/// Test: the persisted latest graph reflects the finished run.
#[tokio::test]
async fn test_pipeline_persists_final_graph() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> =
        vec![ScriptedWorker::approving(), ScriptedWorker::approving()];
    let config = test_config(&dir);
    let mut coordinator = Coordinator::new(config.clone(), workers).unwrap();
    let planner = StaticPlanner {
        graph: fan_out_graph(),
    };

    coordinator.record_prd("requirements").unwrap();
    coordinator.build_graph(&planner).await.unwrap();
    coordinator.validate_graph().unwrap();
    coordinator.approve(true, &planner).await.unwrap();
    coordinator
        .execute(&disjoint_access(&dir, &["A", "B", "C"]))
        .await
        .unwrap();

    let store = GraphStore::new(&config.graph_dir().unwrap());
    let persisted = store.load(None);
    assert!(persisted.all_complete());

    let prd = PrdStore::new(&config.prd_dir().unwrap());
    assert_eq!(prd.load().unwrap(), "requirements");
}

/// Test: review bounces drive the fix/verify loop to completion.
#[tokio::test]
async fn test_pipeline_with_review_bounces() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> =
        vec![ScriptedWorker::bouncing(2), ScriptedWorker::bouncing(2)];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();
    let planner = StaticPlanner {
        graph: fan_out_graph(),
    };

    coordinator.record_prd("requirements").unwrap();
    coordinator.build_graph(&planner).await.unwrap();
    coordinator.validate_graph().unwrap();
    coordinator.approve(true, &planner).await.unwrap();
    coordinator
        .execute(&disjoint_access(&dir, &["A", "B", "C"]))
        .await
        .unwrap();

    assert!(coordinator.graph().all_complete());
}

/// Test: degraded worker reports (all defaults) never wreck the pipeline.
///
/// A default review is a bounce with zero issues; the fix/verify loop
/// still walks the task to completion because verification reports clean.
#[tokio::test]
async fn test_pipeline_survives_degraded_reports() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> = vec![Arc::new(DegradedWorker), Arc::new(DegradedWorker)];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();
    let planner = StaticPlanner {
        graph: GoalGraph::new(vec![Task::new("A", "only task")]),
    };

    coordinator.record_prd("requirements").unwrap();
    coordinator.build_graph(&planner).await.unwrap();
    coordinator.validate_graph().unwrap();
    coordinator.approve(true, &planner).await.unwrap();
    coordinator
        .execute(&disjoint_access(&dir, &["A"]))
        .await
        .unwrap();

    assert!(coordinator.graph().all_complete());
    // Degraded implementations reported no files, so the summary has none.
    let summary = coordinator.summarize().unwrap();
    assert!(summary.files_modified.is_empty());
}

/// Test: a rejected graph loops through revision and can then be approved.
#[tokio::test]
async fn test_pipeline_rejection_revision_loop() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> = vec![ScriptedWorker::approving()];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();
    let planner = StaticPlanner {
        graph: fan_out_graph(),
    };

    coordinator.record_prd("requirements").unwrap();
    coordinator.build_graph(&planner).await.unwrap();
    coordinator.validate_graph().unwrap();

    coordinator.approve(false, &planner).await.unwrap();
    assert_eq!(coordinator.stage(), Stage::GraphReady);

    coordinator.validate_graph().unwrap();
    coordinator.approve(true, &planner).await.unwrap();
    assert_eq!(coordinator.stage(), Stage::GraphApproved);
}

/// Test: graph validation issues surface through the coordinator.
#[tokio::test]
async fn test_pipeline_surfaces_validation_issues() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> = vec![ScriptedWorker::approving()];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();

    let broken = GoalGraph::new(vec![
        Task::new("1", "a").with_dependencies(&["2"]),
        Task::new("2", "b").with_dependencies(&["1"]),
    ]);
    let planner = StaticPlanner { graph: broken };

    coordinator.record_prd("requirements").unwrap();
    coordinator.build_graph(&planner).await.unwrap();
    let issues = coordinator.validate_graph().unwrap();
    assert_eq!(issues.len(), 2); // both cycle members, each exactly once
}

/// Test: stage skipping is rejected loudly.
#[tokio::test]
async fn test_pipeline_stage_skip_rejected() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> = vec![ScriptedWorker::approving()];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();

    let err = coordinator.summarize().unwrap_err();
    assert!(matches!(err, Error::InvalidStageTransition { .. }));

    let err = coordinator.validate_graph().unwrap_err();
    assert!(matches!(err, Error::InvalidStageTransition { .. }));
}

/// Test: a foreign lock on a task's file defers it until expiry-free
/// retry; here we release it mid-run by acquiring with a tiny timeout.
#[tokio::test]
async fn test_pipeline_waits_out_foreign_lock() {
    let dir = TempDir::new().unwrap();
    let workers: Vec<Arc<dyn Worker>> = vec![ScriptedWorker::approving()];
    let mut coordinator = Coordinator::new(test_config(&dir), workers).unwrap();
    let planner = StaticPlanner {
        graph: GoalGraph::new(vec![Task::new("A", "only task")]),
    };

    coordinator.record_prd("requirements").unwrap();
    coordinator.build_graph(&planner).await.unwrap();
    coordinator.validate_graph().unwrap();
    coordinator.approve(true, &planner).await.unwrap();

    let access = disjoint_access(&dir, &["A"]);
    // A stale claim from a dead process, expiring in one second.
    coordinator
        .locks()
        .acquire(&access[&TaskId::from("A")][0], "dead-process", true, 1)
        .unwrap();

    coordinator.execute(&access).await.unwrap();
    assert!(coordinator.graph().all_complete());
    assert_eq!(
        coordinator.graph().get(&TaskId::from("A")).unwrap().status,
        TaskStatus::Completed
    );
}
