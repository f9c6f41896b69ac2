//! Orphan-task and stuck-worker detection.
//!
//! Both scans are read-only, deterministic snapshots taken under the
//! coordinator's state read lock -- they never mutate `worker_assignments`
//! or `task_assignments` themselves.

use chrono::Utc;

use swarmctl_pool::{WorkerPool, WorkerStatus};

use crate::constants::MAX_TASK_DURATION;
use crate::types::TaskAssignment;

/// A task is orphaned when its implementer is unknown to the pool, or the
/// pool records that worker as retired.
pub async fn detect_orphaned_tasks<'a>(
    tasks: impl IntoIterator<Item = &'a TaskAssignment>,
    pool: &WorkerPool,
) -> Vec<String> {
    let mut orphaned = Vec::new();
    for task in tasks {
        let known = pool.get_worker(&task.implementer).await;
        let orphan = match known {
            None => true,
            Some(record) => record.status == WorkerStatus::Retired,
        };
        if orphan {
            orphaned.push(task.task_id.clone());
        }
    }
    orphaned
}

/// A worker is stuck when it holds a task and has done so for longer than
/// [`MAX_TASK_DURATION`]. Idle workers (`task_id` empty) are never stuck.
pub fn check_stuck_workers<'a>(
    assignments: impl IntoIterator<Item = (&'a str, &'a crate::types::WorkerAssignment)>,
) -> Vec<String> {
    let now = Utc::now();
    assignments
        .into_iter()
        .filter(|(_, a)| !a.task_id.is_empty())
        .filter(|(_, a)| {
            let elapsed = now.signed_duration_since(a.assigned_at);
            elapsed
                .to_std()
                .map(|d| d > MAX_TASK_DURATION)
                .unwrap_or(false)
        })
        .map(|(worker_id, _)| worker_id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WorkerAssignment, WorkerPhase, WorkerRole};
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;

    #[tokio::test]
    async fn orphan_detected_for_unknown_worker() {
        let pool = WorkerPool::new();
        let task = TaskAssignment {
            task_id: "perles-abc.1".into(),
            implementer: "worker-1".into(),
            reviewer: None,
            status: crate::types::TaskStatus::Implementing,
            started_at: Utc::now(),
            review_started_at: None,
        };
        let orphaned = detect_orphaned_tasks([&task], &pool).await;
        assert_eq!(orphaned, vec!["perles-abc.1".to_string()]);
    }

    #[tokio::test]
    async fn orphan_detected_for_retired_worker() {
        let pool = WorkerPool::new();
        pool.register("worker-1", None).unwrap();
        pool.retire("worker-1").await.unwrap();
        let task = TaskAssignment {
            task_id: "perles-abc.1".into(),
            implementer: "worker-1".into(),
            reviewer: None,
            status: crate::types::TaskStatus::Implementing,
            started_at: Utc::now(),
            review_started_at: None,
        };
        let orphaned = detect_orphaned_tasks([&task], &pool).await;
        assert_eq!(orphaned, vec!["perles-abc.1".to_string()]);
    }

    #[tokio::test]
    async fn active_worker_not_orphaned() {
        let pool = WorkerPool::new();
        pool.register("worker-1", None).unwrap();
        let task = TaskAssignment {
            task_id: "perles-abc.1".into(),
            implementer: "worker-1".into(),
            reviewer: None,
            status: crate::types::TaskStatus::Implementing,
            started_at: Utc::now(),
            review_started_at: None,
        };
        assert!(detect_orphaned_tasks([&task], &pool).await.is_empty());
    }

    #[test]
    fn idle_worker_never_stuck() {
        let mut assignments = HashMap::new();
        assignments.insert("worker-1".to_string(), WorkerAssignment::idle());
        let stuck = check_stuck_workers(assignments.iter().map(|(k, v)| (k.as_str(), v)));
        assert!(stuck.is_empty());
    }

    #[test]
    fn worker_past_deadline_is_stuck() {
        let mut assignments = HashMap::new();
        assignments.insert(
            "worker-1".to_string(),
            WorkerAssignment {
                task_id: "perles-abc.1".into(),
                role: WorkerRole::Implementer,
                phase: WorkerPhase::Implementing,
                assigned_at: Utc::now() - ChronoDuration::hours(2),
                reviewer_id: None,
                implementer_id: None,
            },
        );
        let stuck = check_stuck_workers(assignments.iter().map(|(k, v)| (k.as_str(), v)));
        assert_eq!(stuck, vec!["worker-1".to_string()]);
    }

    #[test]
    fn worker_within_deadline_not_stuck() {
        let mut assignments = HashMap::new();
        assignments.insert(
            "worker-1".to_string(),
            WorkerAssignment {
                task_id: "perles-abc.1".into(),
                role: WorkerRole::Implementer,
                phase: WorkerPhase::Implementing,
                assigned_at: Utc::now() - ChronoDuration::minutes(5),
                reviewer_id: None,
                implementer_id: None,
            },
        );
        assert!(check_stuck_workers(assignments.iter().map(|(k, v)| (k.as_str(), v))).is_empty());
    }
}
