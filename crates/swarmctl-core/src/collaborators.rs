//! Contracts for the external systems the coordinator core calls into but
//! does not implement: the issue tracker and the LLM subprocess driver.
//!
//! Both are best-effort except where a handler explicitly requires the
//! call to succeed (documented on each tool handler in [`crate::state`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata the coordinator needs about a task before assigning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub title: String,
    pub description: String,
}

/// The issue-tracker side channel. All methods are fallible; callers decide
/// whether a given call is must-succeed or best-effort.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn show_issue(&self, task_id: &str) -> Result<TaskInfo, String>;
    async fn update_status(&self, task_id: &str, status: &str) -> Result<(), String>;
    async fn add_comment(&self, task_id: &str, comment: &str) -> Result<(), String>;
}

/// Drives the LLM subprocess for a worker.
#[async_trait]
pub trait LlmDriver: Send + Sync {
    /// Start or resume a worker's session with the given prompt.
    async fn spawn(&self, worker_id: &str, session_id: &str, prompt: &str) -> Result<(), String>;
}

/// An [`Executor`] that always succeeds, for tests and local experimentation.
pub struct NoopExecutor;

#[async_trait]
impl Executor for NoopExecutor {
    async fn show_issue(&self, task_id: &str) -> Result<TaskInfo, String> {
        Ok(TaskInfo {
            task_id: task_id.to_string(),
            title: String::new(),
            description: String::new(),
        })
    }

    async fn update_status(&self, _task_id: &str, _status: &str) -> Result<(), String> {
        Ok(())
    }

    async fn add_comment(&self, _task_id: &str, _comment: &str) -> Result<(), String> {
        Ok(())
    }
}

/// An [`LlmDriver`] that always succeeds, for tests and local experimentation.
pub struct NoopLlmDriver;

#[async_trait]
impl LlmDriver for NoopLlmDriver {
    async fn spawn(&self, _worker_id: &str, _session_id: &str, _prompt: &str) -> Result<(), String> {
        Ok(())
    }
}
