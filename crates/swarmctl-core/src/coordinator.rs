//! The coordinator state core (C7): owns `worker_assignments` and
//! `task_assignments`, enforces the invariants in the data model, and
//! implements the coordinator-facing tool surface as plain async methods.
//! The MCP layer (`swarmctl-mcp`) is a thin JSON-in/JSON-out shell around
//! these methods -- all state mutation happens here, under one lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use swarmctl_kernel::message_log::{MessageEntry, MessageKind, ALL, COORDINATOR};
use swarmctl_kernel::MessageLog;
use swarmctl_pool::{WorkerPool, WorkerStatus};

use crate::collaborators::{Executor, LlmDriver};
use crate::error::{CoordinatorError, Result};
use crate::queue_manager::{QueueManager, SendOutcome};
use crate::task_id::is_valid_task_id;
use crate::types::{ReviewVerdict, TaskAssignment, TaskStatus, WorkerAssignment, WorkerPhase, WorkerRole};

/// Both assignment maps, covered by a single lock so that every
/// reader/writer sees a consistent cross-section (invariant 1 spans both
/// maps).
#[derive(Default)]
struct Assignments {
    worker: HashMap<String, WorkerAssignment>,
    task: HashMap<String, TaskAssignment>,
}

/// A read-only snapshot of one worker's pool and assignment state, as
/// returned by `list_workers` / `query_worker_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub task_id: Option<String>,
    pub role: Option<WorkerRole>,
    pub phase: WorkerPhase,
}

/// The coordinator's state core: assignment tables, the queue manager, the
/// shared message log, and handles to the two external collaborators
/// (`Executor`, `LlmDriver`).
pub struct CoordinatorState {
    assignments: RwLock<Assignments>,
    pool: WorkerPool,
    queue_manager: Arc<QueueManager>,
    message_log: Arc<MessageLog>,
    executor: Arc<dyn Executor>,
    llm: Arc<dyn LlmDriver>,
}

impl CoordinatorState {
    pub fn new(
        pool: WorkerPool,
        queue_manager: Arc<QueueManager>,
        message_log: Arc<MessageLog>,
        executor: Arc<dyn Executor>,
        llm: Arc<dyn LlmDriver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            assignments: RwLock::new(Assignments::default()),
            pool,
            queue_manager,
            message_log,
            executor,
            llm,
        })
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn queue_manager(&self) -> &Arc<QueueManager> {
        &self.queue_manager
    }

    pub fn message_log(&self) -> &Arc<MessageLog> {
        &self.message_log
    }

    // -- 1. assign_task -----------------------------------------------------

    /// Assign an implementer to a task. Validate-then-commit under the
    /// write lock (§4.7): worker must exist, be `Ready`, and hold no prior
    /// assignment; the task id must be well-formed and not already taken.
    pub async fn assign_task(&self, worker_id: &str, task_id: &str) -> Result<String> {
        if !is_valid_task_id(task_id) {
            return Err(CoordinatorError::InvalidTaskId {
                task_id: task_id.to_string(),
            });
        }

        let worker = self
            .pool
            .get_worker(worker_id)
            .await
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;
        if worker.status != WorkerStatus::Ready {
            return Err(CoordinatorError::WorkerNotReady {
                worker_id: worker_id.to_string(),
            });
        }
        let session_id = worker
            .session_id
            .clone()
            .ok_or_else(|| CoordinatorError::NoSessionId {
                worker_id: worker_id.to_string(),
            })?;

        let task_info = self
            .executor
            .show_issue(task_id)
            .await
            .map_err(|reason| CoordinatorError::TaskInfoUnavailable {
                task_id: task_id.to_string(),
                reason,
            })?;

        {
            let mut guard = self.assignments.write().await;
            if guard
                .worker
                .get(worker_id)
                .is_some_and(|a| !a.is_idle())
            {
                return Err(CoordinatorError::WorkerAlreadyAssigned {
                    worker_id: worker_id.to_string(),
                });
            }
            if guard.task.contains_key(task_id) {
                return Err(CoordinatorError::TaskAlreadyAssigned {
                    task_id: task_id.to_string(),
                });
            }

            guard.worker.insert(
                worker_id.to_string(),
                WorkerAssignment {
                    task_id: task_id.to_string(),
                    role: WorkerRole::Implementer,
                    phase: WorkerPhase::Implementing,
                    assigned_at: Utc::now(),
                    reviewer_id: None,
                    implementer_id: None,
                },
            );
            guard.task.insert(
                task_id.to_string(),
                TaskAssignment {
                    task_id: task_id.to_string(),
                    implementer: worker_id.to_string(),
                    reviewer: None,
                    status: TaskStatus::Implementing,
                    started_at: Utc::now(),
                    review_started_at: None,
                },
            );
        }

        self.pool.assign_task(worker_id).await?;

        let prompt = render_assignment_prompt(task_id, &task_info.title, &task_info.description);
        self.llm
            .spawn(worker_id, &session_id, &prompt)
            .await
            .map_err(|reason| CoordinatorError::SessionResumeFailed {
                worker_id: worker_id.to_string(),
                reason,
            })?;

        info!(worker_id, task_id, "assigned task to implementer");
        Ok(format!("assigned {task_id} to {worker_id}"))
    }

    // -- 2. assign_task_review -----------------------------------------------

    pub async fn assign_task_review(
        &self,
        reviewer_id: &str,
        task_id: &str,
        implementer_id: &str,
        _summary: &str,
    ) -> Result<String> {
        if reviewer_id == implementer_id {
            return Err(CoordinatorError::SelfReviewRejected {
                worker_id: reviewer_id.to_string(),
            });
        }
        let reviewer = self
            .pool
            .get_worker(reviewer_id)
            .await
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: reviewer_id.to_string(),
            })?;
        if reviewer.status != WorkerStatus::Ready {
            return Err(CoordinatorError::WorkerNotReady {
                worker_id: reviewer_id.to_string(),
            });
        }

        {
            let mut guard = self.assignments.write().await;
            if guard
                .worker
                .get(reviewer_id)
                .is_some_and(|a| !a.is_idle())
            {
                return Err(CoordinatorError::WorkerAlreadyAssigned {
                    worker_id: reviewer_id.to_string(),
                });
            }
            let task = guard
                .task
                .get(task_id)
                .ok_or_else(|| CoordinatorError::TaskNotFound {
                    task_id: task_id.to_string(),
                })?;
            if !matches!(task.status, TaskStatus::InReview) {
                return Err(CoordinatorError::UnexpectedTaskStatus {
                    task_id: task_id.to_string(),
                    expected: "in_review".into(),
                    found: task.status.as_str().into(),
                });
            }
            if task.reviewer.is_some() {
                return Err(CoordinatorError::TaskAlreadyAssigned {
                    task_id: task_id.to_string(),
                });
            }

            guard.worker.insert(
                reviewer_id.to_string(),
                WorkerAssignment {
                    task_id: task_id.to_string(),
                    role: WorkerRole::Reviewer,
                    phase: WorkerPhase::Reviewing,
                    assigned_at: Utc::now(),
                    reviewer_id: None,
                    implementer_id: Some(implementer_id.to_string()),
                },
            );
            let task = guard.task.get_mut(task_id).expect("checked above");
            task.reviewer = Some(reviewer_id.to_string());
            task.review_started_at = Some(Utc::now());
        }

        self.pool.assign_task(reviewer_id).await?;
        info!(reviewer_id, task_id, implementer_id, "assigned review");
        Ok(format!("assigned {reviewer_id} to review {task_id}"))
    }

    // -- 3. assign_review_feedback -------------------------------------------

    pub async fn assign_review_feedback(
        &self,
        implementer_id: &str,
        task_id: &str,
        _feedback: &str,
    ) -> Result<String> {
        let mut guard = self.assignments.write().await;
        let task = guard
            .task
            .get(task_id)
            .ok_or_else(|| CoordinatorError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        if !matches!(task.status, TaskStatus::Denied) {
            return Err(CoordinatorError::UnexpectedTaskStatus {
                task_id: task_id.to_string(),
                expected: "denied".into(),
                found: task.status.as_str().into(),
            });
        }
        guard.task.get_mut(task_id).expect("checked above").status = TaskStatus::Implementing;
        let worker = guard
            .worker
            .get_mut(implementer_id)
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: implementer_id.to_string(),
            })?;
        worker.phase = WorkerPhase::AddressingFeedback;
        Ok(format!("{implementer_id} is addressing feedback on {task_id}"))
    }

    // -- 4. approve_commit ----------------------------------------------------

    pub async fn approve_commit(&self, implementer_id: &str, task_id: &str) -> Result<String> {
        let mut guard = self.assignments.write().await;
        let task = guard
            .task
            .get(task_id)
            .ok_or_else(|| CoordinatorError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        if !matches!(task.status, TaskStatus::Approved) {
            return Err(CoordinatorError::UnexpectedTaskStatus {
                task_id: task_id.to_string(),
                expected: "approved".into(),
                found: task.status.as_str().into(),
            });
        }
        guard.task.get_mut(task_id).expect("checked above").status = TaskStatus::Committing;
        let worker = guard
            .worker
            .get_mut(implementer_id)
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: implementer_id.to_string(),
            })?;
        worker.phase = WorkerPhase::Committing;
        Ok(format!("{task_id} approved for commit by {implementer_id}"))
    }

    // -- 5. mark_task_complete ------------------------------------------------

    pub async fn mark_task_complete(&self, task_id: &str) -> Result<String> {
        let implementer_id = {
            let guard = self.assignments.read().await;
            let task = guard
                .task
                .get(task_id)
                .ok_or_else(|| CoordinatorError::TaskNotFound {
                    task_id: task_id.to_string(),
                })?;
            if !matches!(task.status, TaskStatus::Committing) {
                return Err(CoordinatorError::UnexpectedTaskStatus {
                    task_id: task_id.to_string(),
                    expected: "committing".into(),
                    found: task.status.as_str().into(),
                });
            }
            task.implementer.clone()
        };

        self.executor
            .update_status(task_id, "closed")
            .await
            .map_err(|reason| CoordinatorError::TaskStatusUpdateFailed {
                task_id: task_id.to_string(),
                reason,
            })?;
        if let Err(reason) = self
            .executor
            .add_comment(task_id, "task completed by swarmctl")
            .await
        {
            warn!(task_id, reason, "best-effort completion comment failed");
        }

        {
            let mut guard = self.assignments.write().await;
            guard.task.get_mut(task_id).expect("checked above").status = TaskStatus::Completed;
            if let Some(worker) = guard.worker.get_mut(&implementer_id) {
                *worker = WorkerAssignment::idle();
            }
        }
        self.pool.complete_task(&implementer_id).await?;
        info!(task_id, implementer_id, "task completed");
        Ok(format!("{task_id} marked completed"))
    }

    // -- 6. mark_task_failed --------------------------------------------------

    pub async fn mark_task_failed(&self, task_id: &str, reason: &str) -> Result<String> {
        self.executor
            .add_comment(task_id, &format!("task failed: {reason}"))
            .await
            .map_err(|reason| CoordinatorError::TaskStatusUpdateFailed {
                task_id: task_id.to_string(),
                reason,
            })?;

        let mut guard = self.assignments.write().await;
        let task = guard
            .task
            .get_mut(task_id)
            .ok_or_else(|| CoordinatorError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        task.status = TaskStatus::Failed;
        Ok(format!("{task_id} marked failed: {reason}"))
    }

    // -- 7. list_workers / query_worker_state --------------------------------

    pub async fn list_workers(&self) -> Vec<WorkerSnapshot> {
        let guard = self.assignments.read().await;
        let mut out = Vec::new();
        for record in self.pool.all_workers().await {
            let assignment = guard.worker.get(&record.id);
            out.push(WorkerSnapshot {
                worker_id: record.id,
                status: record.status,
                task_id: assignment
                    .filter(|a| !a.task_id.is_empty())
                    .map(|a| a.task_id.clone()),
                role: assignment.map(|a| a.role),
                phase: assignment.map(|a| a.phase).unwrap_or(WorkerPhase::Idle),
            });
        }
        out
    }

    pub async fn query_worker_state(
        &self,
        worker_id: Option<&str>,
        task_id: Option<&str>,
    ) -> Vec<WorkerSnapshot> {
        let all = self.list_workers().await;
        all.into_iter()
            .filter(|w| worker_id.is_none_or(|id| w.worker_id == id))
            .filter(|w| task_id.is_none_or(|id| w.task_id.as_deref() == Some(id)))
            .collect()
    }

    // -- 8. message bus operations --------------------------------------------

    pub async fn send_to_worker(&self, worker_id: &str, message: &str) -> Result<SendOutcome> {
        self.queue_manager.send_to_worker(worker_id, message).await
    }

    pub async fn post_message(&self, to: &str, content: &str) -> MessageEntry {
        self.message_log
            .append(COORDINATOR, to, content, MessageKind::Info)
            .await
    }

    pub async fn read_message_log(&self, limit: Option<usize>, read_all: bool) -> Vec<MessageEntry> {
        let mut entries = if read_all {
            self.message_log.entries().await
        } else {
            self.message_log.unread_for(COORDINATOR).await
        };
        if !read_all {
            self.message_log.mark_read(COORDINATOR).await;
        }
        if let Some(limit) = limit {
            if entries.len() > limit {
                entries = entries.split_off(entries.len() - limit);
            }
        }
        entries
    }

    pub async fn prepare_handoff(&self, summary: &str) -> MessageEntry {
        self.message_log
            .append(COORDINATOR, ALL, summary, MessageKind::Handoff)
            .await
    }

    // -- 9. replace_worker -----------------------------------------------------

    /// Drain the worker's queue, retire it, clear its assignment, and
    /// register a fresh idle worker to take its place. Returns the new
    /// worker's id.
    pub async fn replace_worker(&self, worker_id: &str, reason: &str) -> Result<String> {
        let drained = self
            .queue_manager
            .drain_queue_for_retired_worker(worker_id)
            .await;
        if !drained.is_empty() {
            warn!(worker_id, count = drained.len(), reason, "replacing worker, dropping queued messages");
        }
        self.pool.retire(worker_id).await?;

        {
            let mut guard = self.assignments.write().await;
            guard.worker.remove(worker_id);
        }

        let replacement_id = format!("worker-{}", Uuid::now_v7());
        self.pool.register(replacement_id.clone(), None)?;
        info!(worker_id, replacement_id, reason, "worker replaced");
        Ok(replacement_id)
    }

    // -- 10. worker-facing callback interface ----------------------------------

    /// Current phase for `worker_id`, or `Idle` if unknown (matches the
    /// spec's "or idle if unknown" fallback for unassigned workers).
    pub async fn get_worker_phase(&self, worker_id: &str) -> WorkerPhase {
        self.assignments
            .read()
            .await
            .worker
            .get(worker_id)
            .map(|a| a.phase)
            .unwrap_or(WorkerPhase::Idle)
    }

    /// Invoked by the worker-facing MCP server's `report_implementation_complete`
    /// handler. Rejected unless the worker's phase is `implementing` or
    /// `addressing_feedback`.
    pub async fn on_implementation_complete(&self, worker_id: &str, _summary: &str) -> Result<()> {
        let mut guard = self.assignments.write().await;
        let worker = guard
            .worker
            .get_mut(worker_id)
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;
        if !matches!(
            worker.phase,
            WorkerPhase::Implementing | WorkerPhase::AddressingFeedback
        ) {
            return Err(CoordinatorError::UnexpectedWorkerPhase {
                worker_id: worker_id.to_string(),
                expected: "implementing or addressing_feedback".into(),
                found: worker.phase.as_str().into(),
            });
        }
        let task_id = worker.task_id.clone();
        worker.phase = WorkerPhase::AwaitingReview;

        if let Some(task) = guard.task.get_mut(&task_id) {
            task.status = TaskStatus::InReview;
        }
        Ok(())
    }

    /// Invoked by the worker-facing MCP server's `report_review_verdict`
    /// handler. Rejected unless the worker's phase is `reviewing`.
    pub async fn on_review_verdict(
        &self,
        worker_id: &str,
        verdict: ReviewVerdict,
        _comments: &str,
    ) -> Result<()> {
        let mut guard = self.assignments.write().await;
        let worker = guard
            .worker
            .get(worker_id)
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;
        if !matches!(worker.phase, WorkerPhase::Reviewing) {
            return Err(CoordinatorError::UnexpectedWorkerPhase {
                worker_id: worker_id.to_string(),
                expected: "reviewing".into(),
                found: worker.phase.as_str().into(),
            });
        }
        let task_id = worker.task_id.clone();

        guard.worker.insert(worker_id.to_string(), WorkerAssignment::idle());

        if let Some(task) = guard.task.get_mut(&task_id) {
            task.status = match verdict {
                ReviewVerdict::Approved => TaskStatus::Approved,
                ReviewVerdict::Denied => TaskStatus::Denied,
            };
        }
        Ok(())
    }

    // -- detection ---------------------------------------------------------

    pub async fn detect_orphaned_tasks(&self) -> Vec<String> {
        let guard = self.assignments.read().await;
        crate::detection::detect_orphaned_tasks(guard.task.values(), &self.pool).await
    }

    pub async fn check_stuck_workers(&self) -> Vec<String> {
        let guard = self.assignments.read().await;
        crate::detection::check_stuck_workers(guard.worker.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

fn render_assignment_prompt(task_id: &str, title: &str, description: &str) -> String {
    format!(
        "You have been assigned task {task_id}.\n\nTitle: {title}\n\n{description}\n\n\
         Implement it, then call report_implementation_complete with a summary."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NoopExecutor, NoopLlmDriver};
    use std::sync::Arc;

    async fn harness() -> Arc<CoordinatorState> {
        let pool = WorkerPool::new();
        let llm = Arc::new(NoopLlmDriver);
        let qm = QueueManager::new(pool.clone(), llm.clone());
        qm.attach_to_pool().await;
        let log = Arc::new(MessageLog::new());
        CoordinatorState::new(pool, qm, log, Arc::new(NoopExecutor), llm)
    }

    #[tokio::test]
    async fn happy_path_e1() {
        let state = harness().await;
        state.pool().register("worker-1", Some("sess-1".into())).unwrap();
        state.pool().register("worker-2", Some("sess-2".into())).unwrap();

        state.assign_task("worker-1", "perles-abc.1").await.unwrap();
        assert_eq!(state.get_worker_phase("worker-1").await, WorkerPhase::Implementing);

        state
            .on_implementation_complete("worker-1", "done")
            .await
            .unwrap();
        assert_eq!(state.get_worker_phase("worker-1").await, WorkerPhase::AwaitingReview);

        state
            .assign_task_review("worker-2", "perles-abc.1", "worker-1", "please review")
            .await
            .unwrap();
        assert_eq!(state.get_worker_phase("worker-2").await, WorkerPhase::Reviewing);

        state
            .on_review_verdict("worker-2", ReviewVerdict::Approved, "lgtm")
            .await
            .unwrap();
        assert_eq!(state.get_worker_phase("worker-2").await, WorkerPhase::Idle);

        state.approve_commit("worker-1", "perles-abc.1").await.unwrap();
        assert_eq!(state.get_worker_phase("worker-1").await, WorkerPhase::Committing);

        state.mark_task_complete("perles-abc.1").await.unwrap();
        assert_eq!(state.get_worker_phase("worker-1").await, WorkerPhase::Idle);

        let snapshot = state
            .query_worker_state(Some("worker-1"), None)
            .await
            .pop()
            .unwrap();
        assert_eq!(snapshot.task_id, None);
    }

    #[tokio::test]
    async fn denial_cycle_e2() {
        let state = harness().await;
        state.pool().register("worker-1", Some("sess-1".into())).unwrap();
        state.pool().register("worker-2", Some("sess-2".into())).unwrap();

        state.assign_task("worker-1", "perles-abc.1").await.unwrap();
        state
            .on_implementation_complete("worker-1", "done")
            .await
            .unwrap();
        state
            .assign_task_review("worker-2", "perles-abc.1", "worker-1", "review")
            .await
            .unwrap();
        state
            .on_review_verdict("worker-2", ReviewVerdict::Denied, "needs work")
            .await
            .unwrap();

        state
            .assign_review_feedback("worker-1", "perles-abc.1", "fix this")
            .await
            .unwrap();
        assert_eq!(state.get_worker_phase("worker-1").await, WorkerPhase::AddressingFeedback);

        state
            .on_implementation_complete("worker-1", "fixed")
            .await
            .unwrap();
        assert_eq!(state.get_worker_phase("worker-1").await, WorkerPhase::AwaitingReview);
    }

    #[tokio::test]
    async fn self_review_rejected() {
        let state = harness().await;
        state.pool().register("worker-1", Some("sess-1".into())).unwrap();
        state.assign_task("worker-1", "perles-abc.1").await.unwrap();
        let err = state
            .assign_task_review("worker-1", "perles-abc.1", "worker-1", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::SelfReviewRejected { .. }));
    }

    #[tokio::test]
    async fn invalid_task_id_rejected_before_mutation() {
        let state = harness().await;
        state.pool().register("worker-1", Some("sess-1".into())).unwrap();
        let err = state.assign_task("worker-1", "nope").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidTaskId { .. }));
        assert!(state.list_workers().await[0].task_id.is_none());
    }

    #[tokio::test]
    async fn concurrent_double_assign_e5() {
        let state = harness().await;
        for i in 0..10 {
            state
                .pool()
                .register(format!("worker-{i}"), Some(format!("sess-{i}")))
                .unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..10 {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move {
                state
                    .assign_task(&format!("worker-{i}"), "perles-abc.1")
                    .await
            }));
        }

        let mut ok_count = 0;
        let mut err_count = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok_count += 1,
                Err(_) => err_count += 1,
            }
        }
        assert_eq!(ok_count, 1);
        assert_eq!(err_count, 9);
    }

    #[tokio::test]
    async fn orphan_on_retire_e4() {
        let state = harness().await;
        state.pool().register("worker-1", Some("sess-1".into())).unwrap();
        state.assign_task("worker-1", "perles-abc.1").await.unwrap();

        // retire() awaits the registered drain callback before returning, so
        // the queue is already gone here -- no sleep needed.
        state.pool().retire("worker-1").await.unwrap();

        let orphaned = state.detect_orphaned_tasks().await;
        assert_eq!(orphaned, vec!["perles-abc.1".to_string()]);
        assert_eq!(state.queue_manager().queue_len("worker-1").await, 0);
    }

    #[tokio::test]
    async fn replace_worker_drains_and_reassigns() {
        let state = harness().await;
        state.pool().register("worker-1", Some("sess-1".into())).unwrap();
        state.pool().assign_task("worker-1").await.unwrap();
        state.send_to_worker("worker-1", "m1").await.unwrap();

        let replacement = state.replace_worker("worker-1", "unresponsive").await.unwrap();
        assert_ne!(replacement, "worker-1");
        assert_eq!(state.queue_manager().queue_len("worker-1").await, 0);
        let record = state.pool().get_worker(&replacement).await.unwrap();
        assert_eq!(record.status, WorkerStatus::Ready);
    }
}
