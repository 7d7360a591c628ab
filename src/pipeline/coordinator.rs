//! The coordinator: single control flow driving the whole pipeline.
//!
//! The coordinator owns the Goal Graph, the lock manager, the worker pool,
//! and the pipeline state record, and sequences spec → graph → validation →
//! approval → execution → summary. Workers only ever see `(task, files)`
//! pairs; every dispatch is bracketed by lock acquisition before the worker
//! starts and release after its report is captured, which is what makes
//! parallel dispatch over disjoint file sets safe.

use futures::future::join_all;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::{GoalGraph, GraphStore, PrdStore, Task, TaskId, TaskStatus, ValidationIssue};
use crate::lock::LockManager;
use crate::pipeline::stage::Stage;
use crate::pipeline::state::PipelineState;
use crate::pipeline::summary::ProjectSummary;
use crate::sched::{self, Assignments, WorkerPool};
use crate::worker::{
    FixReport, ImplementationReport, Planner, ReviewReport, Role, VerifyReport, Worker, WorkerId,
};

/// File-access lists per task, chosen by the caller before execution.
pub type AccessMap = HashMap<TaskId, Vec<PathBuf>>;

/// Drives the pipeline from requirements to summary.
pub struct Coordinator {
    config: Config,
    locks: LockManager,
    graph_store: GraphStore,
    prd_store: PrdStore,
    pool: WorkerPool,
    executors: HashMap<WorkerId, Arc<dyn Worker>>,
    state: PipelineState,
    graph: GoalGraph,
    prd: Option<String>,
    last_validation: Vec<ValidationIssue>,
    // NeedsReview provenance: a task is either awaiting its first review or
    // awaiting verification of a fix, never both.
    pending_review: HashMap<TaskId, ImplementationReport>,
    pending_fixes: HashMap<TaskId, ReviewReport>,
    pending_verify: HashMap<TaskId, (ReviewReport, FixReport)>,
    files_modified: BTreeSet<PathBuf>,
}

impl Coordinator {
    /// Create a coordinator with one pool slot per executor.
    pub fn new(config: Config, workers: Vec<Arc<dyn Worker>>) -> Result<Self> {
        config.ensure_dirs()?;
        let locks = LockManager::new(&config.lock_dir()?).with_gate_retries(
            config.gate_retries,
            Duration::from_millis(config.gate_retry_delay_ms),
        );
        let graph_store = GraphStore::new(&config.graph_dir()?);
        let prd_store = PrdStore::new(&config.prd_dir()?);

        let mut pool = WorkerPool::default();
        let mut executors = HashMap::new();
        for worker in workers {
            let id = pool.register(Role::Coder);
            executors.insert(id, worker);
        }
        info!(workers = pool.len(), "coordinator ready");

        Ok(Self {
            config,
            locks,
            graph_store,
            prd_store,
            pool,
            executors,
            state: PipelineState::new(),
            graph: GoalGraph::default(),
            prd: None,
            last_validation: Vec::new(),
            pending_review: HashMap::new(),
            pending_fixes: HashMap::new(),
            pending_verify: HashMap::new(),
            files_modified: BTreeSet::new(),
        })
    }

    // ---- accessors ----

    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn graph(&self) -> &GoalGraph {
        &self.graph
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    // ---- requirements and graph stages ----

    /// Record the requirements document and persist a snapshot.
    pub fn record_prd(&mut self, prd: &str) -> Result<()> {
        self.state.transition(Stage::PrdReady)?;
        self.prd_store.persist(prd)?;
        self.prd = Some(prd.to_string());
        info!(bytes = prd.len(), "requirements recorded");
        Ok(())
    }

    /// Derive a Goal Graph from the recorded requirements.
    pub async fn build_graph(&mut self, planner: &dyn Planner) -> Result<()> {
        let prd = self.prd.clone().ok_or(Error::NoPrd)?;
        let mut graph = planner.generate(&prd).await;
        graph.normalize();
        self.graph_store.persist(&graph)?;
        info!(tasks = graph.len(), "goal graph built");
        self.graph = graph;
        self.state.transition(Stage::GraphReady)?;
        Ok(())
    }

    /// Validate the graph, returning the issues found.
    pub fn validate_graph(&mut self) -> Result<Vec<ValidationIssue>> {
        self.state.transition(Stage::GraphValidated)?;
        let issues = self.graph.validate();
        if issues.is_empty() {
            info!("goal graph is valid");
        } else {
            warn!(issues = issues.len(), "goal graph validation found issues");
        }
        self.last_validation = issues.clone();
        Ok(issues)
    }

    /// Apply the external approval signal.
    ///
    /// On approval the pipeline advances to GraphApproved. On rejection the
    /// graph is revised by the planner against the last validation issues
    /// and the pipeline loops back to GraphReady for another
    /// validation/approval round.
    pub async fn approve(&mut self, approved: bool, planner: &dyn Planner) -> Result<()> {
        if approved {
            self.state.transition(Stage::GraphApproved)?;
            info!("goal graph approved");
            return Ok(());
        }

        let mut revised = planner.revise(&self.graph, &self.last_validation).await;
        revised.normalize();
        self.graph_store.persist(&revised)?;
        info!(tasks = revised.len(), "goal graph revised after rejection");
        self.graph = revised;
        self.state.transition(Stage::GraphReady)?;
        Ok(())
    }

    // ---- scheduling ----

    /// Run one assignment round.
    ///
    /// Enters the Executing stage on the first call after approval.
    pub fn assign(&mut self) -> Result<Assignments> {
        if self.state.stage() != Stage::Executing {
            self.state.transition(Stage::Executing)?;
        }
        Ok(sched::assign(&mut self.graph, &self.pool))
    }

    // ---- per-task operations ----

    /// Dispatch one implementation pass for an assigned task.
    ///
    /// Exclusive locks on the file set are held for exactly the duration of
    /// the worker call. On contention the task stays assigned and the error
    /// surfaces for the caller to retry.
    pub async fn implement_task(
        &mut self,
        task_id: &TaskId,
        files: &[PathBuf],
    ) -> Result<ImplementationReport> {
        let (worker_id, executor, task) = self.begin_exclusive(task_id, files)?;
        let report = executor.implement(&task, files).await;
        self.finish_implement(task_id, &worker_id, files, report)
    }

    /// Review a freshly implemented task.
    ///
    /// Only legal on a task whose NeedsReview status came from an
    /// implementation pass; a post-fix task must go through `verify_task`.
    pub async fn review_task(&mut self, task_id: &TaskId) -> Result<ReviewReport> {
        let task = self.task_snapshot(task_id)?;
        self.require_status(&task, TaskStatus::NeedsReview)?;
        if self.pending_verify.contains_key(task_id) {
            return Err(Error::Precondition {
                task: task_id.to_string(),
                expected: "Needs Review from an implementation pass".to_string(),
                actual: "Needs Review from a fix pass (verify instead)".to_string(),
            });
        }
        let impl_report = match self.pending_review.get(task_id) {
            Some(report) => report.clone(),
            None => {
                return Err(Error::Precondition {
                    task: task_id.to_string(),
                    expected: "Needs Review with a captured implementation report".to_string(),
                    actual: task.status.to_string(),
                })
            }
        };

        let reviewer = self
            .pool
            .peer_of(&task.owner)
            .ok_or_else(|| Error::WorkerNotFound("pool is empty".to_string()))?;
        let executor = self.executor(&reviewer)?;
        let files = impl_report.files_modified.clone();
        let reviewer_name = reviewer.to_string();

        self.pool.checkout(&reviewer, task_id)?;
        if let Err(err) =
            self.locks
                .acquire_set(&files, &reviewer_name, false, self.config.lock_timeout_secs)
        {
            let _ = self.pool.checkin(&reviewer);
            return Err(err);
        }
        let review = executor.review(&task, &impl_report, &files).await;
        self.locks.release_set(&files, &reviewer_name)?;
        self.pool.checkin(&reviewer)?;

        self.pending_review.remove(task_id);
        if review.approved {
            self.set_status(task_id, TaskStatus::Completed)?;
            info!(task = %task_id, "review approved, task completed");
        } else {
            self.set_status(task_id, TaskStatus::NeedsFixes)?;
            self.pending_fixes.insert(task_id.clone(), review.clone());
            info!(task = %task_id, issues = review.issues.len(), "review raised issues");
        }
        Ok(review)
    }

    /// Dispatch a fix pass for a task the review bounced.
    ///
    /// Only legal on a task whose status is exactly NeedsFixes, set by the
    /// immediately preceding review (or failed verification).
    pub async fn fix_task(&mut self, task_id: &TaskId, files: &[PathBuf]) -> Result<FixReport> {
        let task = self.task_snapshot(task_id)?;
        self.require_status(&task, TaskStatus::NeedsFixes)?;
        let review = match self.pending_fixes.get(task_id) {
            Some(review) => review.clone(),
            None => {
                return Err(Error::Precondition {
                    task: task_id.to_string(),
                    expected: "Needs Fixes set by the preceding review".to_string(),
                    actual: task.status.to_string(),
                })
            }
        };

        let worker_id = self.worker_by_owner(&task.owner)?;
        let executor = self.executor(&worker_id)?;
        self.pool.checkout(&worker_id, task_id)?;
        if let Err(err) =
            self.locks
                .acquire_set(files, &task.owner, true, self.config.lock_timeout_secs)
        {
            let _ = self.pool.checkin(&worker_id);
            return Err(err);
        }
        let fix = executor.fix(&review.issues, files).await;
        self.locks.release_set(files, &task.owner)?;
        self.pool.checkin(&worker_id)?;

        self.files_modified.extend(fix.files_modified.iter().cloned());
        self.set_status(task_id, TaskStatus::NeedsReview)?;
        self.pending_fixes.remove(task_id);
        self.pending_verify
            .insert(task_id.clone(), (review, fix.clone()));
        info!(task = %task_id, fixed = fix.fixed_issues.len(), "fix pass captured, awaiting verification");
        Ok(fix)
    }

    /// Verify the fixes applied to a task.
    ///
    /// Only legal on a task whose NeedsReview status followed a fix pass,
    /// never after the first implementation, which goes through
    /// `review_task`.
    pub async fn verify_task(&mut self, task_id: &TaskId) -> Result<VerifyReport> {
        let task = self.task_snapshot(task_id)?;
        self.require_status(&task, TaskStatus::NeedsReview)?;
        let (review, fix) = match self.pending_verify.remove(task_id) {
            Some(pair) => pair,
            None => {
                return Err(Error::Precondition {
                    task: task_id.to_string(),
                    expected: "Needs Review following a fix".to_string(),
                    actual: "Needs Review following implementation (review instead)".to_string(),
                })
            }
        };

        let verifier = self
            .pool
            .peer_of(&task.owner)
            .ok_or_else(|| Error::WorkerNotFound("pool is empty".to_string()))?;
        let executor = self.executor(&verifier)?;
        let files = fix.files_modified.clone();
        let verifier_name = verifier.to_string();

        self.pool.checkout(&verifier, task_id)?;
        if let Err(err) =
            self.locks
                .acquire_set(&files, &verifier_name, false, self.config.lock_timeout_secs)
        {
            let _ = self.pool.checkin(&verifier);
            // Put the pair back so the verify can be retried.
            self.pending_verify.insert(task_id.clone(), (review, fix));
            return Err(err);
        }
        let verify = executor.verify(&task, &review.issues, &fix, &files).await;
        self.locks.release_set(&files, &verifier_name)?;
        self.pool.checkin(&verifier)?;

        if verify.all_fixed {
            self.set_status(task_id, TaskStatus::Completed)?;
            info!(task = %task_id, "fixes verified, task completed");
        } else {
            self.set_status(task_id, TaskStatus::NeedsFixes)?;
            self.pending_fixes.insert(
                task_id.clone(),
                ReviewReport {
                    approved: false,
                    issues: verify.remaining_issues.clone(),
                },
            );
            info!(
                task = %task_id,
                remaining = verify.remaining_issues.len(),
                "verification found remaining issues"
            );
        }
        Ok(verify)
    }

    // ---- execution loop ----

    /// Drive the execution loop until the graph completes.
    ///
    /// Each round assigns ready tasks, dispatches one implementation per
    /// worker in parallel (file sets are disjoint by construction of the
    /// access map), then walks each implemented task through
    /// review/fix/verify until it completes. Tasks whose file set is held
    /// by a foreign lock are deferred and retried; the lock expiry is the
    /// only thing that unwedges a crashed holder.
    pub async fn execute(&mut self, access: &AccessMap) -> Result<()> {
        if self.state.stage() != Stage::Executing {
            self.state.transition(Stage::Executing)?;
        }

        loop {
            if self.graph.all_complete() {
                break;
            }

            let assignments = self.assign()?;
            let worker_order = self.pool.ids();
            let mut queues: Vec<(WorkerId, VecDeque<TaskId>)> = worker_order
                .iter()
                .map(|id| {
                    (
                        *id,
                        assignments.get(id).cloned().unwrap_or_default().into(),
                    )
                })
                .collect();

            let assigned: usize = queues.iter().map(|(_, q)| q.len()).sum();
            if assigned == 0 {
                if !self.graph.all_complete() {
                    warn!("no schedulable tasks remain, leaving execution loop");
                }
                break;
            }

            while queues.iter().any(|(_, q)| !q.is_empty()) {
                let mut wave = Vec::new();
                for (worker, queue) in &mut queues {
                    if let Some(task_id) = queue.pop_front() {
                        wave.push((*worker, task_id));
                    }
                }

                let mut running = Vec::new();
                let mut deferred = Vec::new();
                for (worker, task_id) in wave {
                    let files = access.get(&task_id).cloned().unwrap_or_default();
                    match self.begin_exclusive(&task_id, &files) {
                        Ok((worker_id, executor, task)) => {
                            running.push(async move {
                                let report = executor.implement(&task, &files).await;
                                (task_id, worker_id, files, report)
                            });
                        }
                        Err(Error::Contention { holder, .. }) => {
                            debug!(task = %task_id, %holder, "file set contended, deferring");
                            deferred.push((worker, task_id));
                        }
                        Err(err) => return Err(err),
                    }
                }

                let made_progress = !running.is_empty();
                for (task_id, worker_id, files, report) in join_all(running).await {
                    self.finish_implement(&task_id, &worker_id, &files, report)?;
                    self.review_cycle(&task_id, &files).await?;
                }

                for (worker, task_id) in deferred {
                    if let Some((_, queue)) = queues.iter_mut().find(|(w, _)| *w == worker) {
                        queue.push_back(task_id);
                    }
                }
                if !made_progress {
                    // Every dispatch hit a foreign lock; wait out the expiry.
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        self.graph_store.persist(&self.graph)?;
        Ok(())
    }

    /// Produce the final summary and enter the terminal stage.
    pub fn summarize(&mut self) -> Result<ProjectSummary> {
        self.state.transition(Stage::Summarized)?;
        self.graph_store.persist(&self.graph)?;
        let summary = ProjectSummary::from_graph(&self.graph, &self.files_modified);
        info!(
            completed = summary.completed_tasks.len(),
            total = summary.total_tasks,
            "pipeline summarized"
        );
        Ok(summary)
    }

    // ---- internals ----

    /// Review an implemented task, then cycle fix/verify until it
    /// completes. The cycle is unbounded; no retry cap is imposed.
    async fn review_cycle(&mut self, task_id: &TaskId, files: &[PathBuf]) -> Result<()> {
        let review = self.review_task(task_id).await?;
        if review.approved {
            return Ok(());
        }
        loop {
            self.fix_task(task_id, files).await?;
            let verify = self.verify_task(task_id).await?;
            if verify.all_fixed {
                return Ok(());
            }
        }
    }

    /// Checkout + exclusive lock acquisition for a dispatch.
    ///
    /// Lock acquisition happens-before the worker begins; on failure the
    /// checkout is rolled back so the pool stays consistent.
    fn begin_exclusive(
        &mut self,
        task_id: &TaskId,
        files: &[PathBuf],
    ) -> Result<(WorkerId, Arc<dyn Worker>, Task)> {
        let task = self.task_snapshot(task_id)?;
        self.require_status(&task, TaskStatus::InProgress)?;
        let worker_id = self.worker_by_owner(&task.owner)?;
        let executor = self.executor(&worker_id)?;

        self.pool.checkout(&worker_id, task_id)?;
        if let Err(err) =
            self.locks
                .acquire_set(files, &task.owner, true, self.config.lock_timeout_secs)
        {
            let _ = self.pool.checkin(&worker_id);
            return Err(err);
        }
        Ok((worker_id, executor, task))
    }

    /// Release locks, free the worker, and record the implementation.
    fn finish_implement(
        &mut self,
        task_id: &TaskId,
        worker_id: &WorkerId,
        files: &[PathBuf],
        report: ImplementationReport,
    ) -> Result<ImplementationReport> {
        let owner = self
            .graph
            .get(task_id)
            .map(|t| t.owner.clone())
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        self.locks.release_set(files, &owner)?;
        self.pool.checkin(worker_id)?;

        self.files_modified
            .extend(report.files_modified.iter().cloned());
        self.set_status(task_id, TaskStatus::NeedsReview)?;
        self.pending_review.insert(task_id.clone(), report.clone());
        info!(task = %task_id, "implementation captured, awaiting review");
        Ok(report)
    }

    fn task_snapshot(&self, task_id: &TaskId) -> Result<Task> {
        self.graph
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    fn require_status(&self, task: &Task, expected: TaskStatus) -> Result<()> {
        if task.status != expected {
            return Err(Error::Precondition {
                task: task.id.to_string(),
                expected: expected.to_string(),
                actual: task.status.to_string(),
            });
        }
        Ok(())
    }

    fn set_status(&mut self, task_id: &TaskId, status: TaskStatus) -> Result<()> {
        let task = self
            .graph
            .get_mut(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        task.status = status;
        Ok(())
    }

    fn worker_by_owner(&self, owner: &str) -> Result<WorkerId> {
        self.pool
            .ids()
            .into_iter()
            .find(|id| id.to_string() == owner)
            .ok_or_else(|| Error::WorkerNotFound(owner.to_string()))
    }

    fn executor(&self, id: &WorkerId) -> Result<Arc<dyn Worker>> {
        self.executors
            .get(id)
            .cloned()
            .ok_or_else(|| Error::WorkerNotFound(id.to_string()))
    }
}
