//! Core data types for the assignment state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role a worker holds on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Implementer,
    Reviewer,
}

/// A worker's step in the per-task state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Idle,
    Implementing,
    AwaitingReview,
    Reviewing,
    AddressingFeedback,
    Committing,
}

impl WorkerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::Implementing => "implementing",
            WorkerPhase::AwaitingReview => "awaiting_review",
            WorkerPhase::Reviewing => "reviewing",
            WorkerPhase::AddressingFeedback => "addressing_feedback",
            WorkerPhase::Committing => "committing",
        }
    }
}

/// A task's position in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Implementing,
    InReview,
    Approved,
    Denied,
    Committing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Implementing => "implementing",
            TaskStatus::InReview => "in_review",
            TaskStatus::Approved => "approved",
            TaskStatus::Denied => "denied",
            TaskStatus::Committing => "committing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// The outcome a reviewer reports for a task under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    Denied,
}

/// What a worker is currently doing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub task_id: String,
    pub role: WorkerRole,
    pub phase: WorkerPhase,
    pub assigned_at: DateTime<Utc>,
    pub reviewer_id: Option<String>,
    pub implementer_id: Option<String>,
}

impl WorkerAssignment {
    pub fn idle() -> Self {
        Self {
            task_id: String::new(),
            role: WorkerRole::Implementer,
            phase: WorkerPhase::Idle,
            assigned_at: Utc::now(),
            reviewer_id: None,
            implementer_id: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == WorkerPhase::Idle
    }
}

/// What is happening with a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: String,
    pub implementer: String,
    pub reviewer: Option<String>,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub review_started_at: Option<DateTime<Utc>>,
}
