//! The coordinator-facing tool surface: thin JSON-in/JSON-out wrappers
//! around [`swarmctl_core::CoordinatorState`]'s methods. All state
//! mutation happens in that crate; every handler here just deserializes
//! arguments, calls the matching method, and serializes the result.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use swarmctl_core::{CoordinatorState, SendOutcome};

use crate::handler::{CallContext, ToolHandler};
use crate::protocol::{ToolCallResult, ToolDefinition};

fn missing(field: &str) -> String {
    format!("missing required field `{field}`")
}

fn outcome_json(outcome: SendOutcome) -> Value {
    match outcome {
        SendOutcome::Sent => json!({ "status": "sent" }),
        SendOutcome::Queued { queue_position } => {
            json!({ "status": "queued", "queue_position": queue_position })
        }
    }
}

macro_rules! simple_tool {
    ($ty:ident, $name:literal, $desc:literal, $args:ty, $schema:expr, |$state:ident, $args_name:ident| $body:expr) => {
        pub struct $ty {
            state: Arc<CoordinatorState>,
        }

        impl $ty {
            pub fn new(state: Arc<CoordinatorState>) -> Self {
                Self { state }
            }
        }

        #[async_trait]
        impl ToolHandler for $ty {
            fn definition(&self) -> ToolDefinition {
                ToolDefinition {
                    name: $name.into(),
                    description: $desc.into(),
                    input_schema: $schema,
                    output_schema: None,
                }
            }

            async fn call(&self, _ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
                let $args_name: $args = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
                let $state = &self.state;
                $body
            }
        }
    };
}

#[derive(Deserialize)]
struct AssignTaskArgs {
    worker_id: Option<String>,
    task_id: Option<String>,
}

simple_tool!(
    AssignTaskTool,
    "assign_task",
    "Assign an implementer to a task",
    AssignTaskArgs,
    json!({
        "type": "object",
        "properties": {
            "worker_id": {"type": "string"},
            "task_id": {"type": "string"},
        },
        "required": ["worker_id", "task_id"],
    }),
    |state, args| {
        let worker_id = args.worker_id.ok_or_else(|| missing("worker_id"))?;
        let task_id = args.task_id.ok_or_else(|| missing("task_id"))?;
        let message = state
            .assign_task(&worker_id, &task_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(message))
    }
);

#[derive(Deserialize)]
struct AssignTaskReviewArgs {
    reviewer_id: Option<String>,
    task_id: Option<String>,
    implementer_id: Option<String>,
    summary: Option<String>,
}

simple_tool!(
    AssignTaskReviewTool,
    "assign_task_review",
    "Assign a reviewer to a task awaiting review",
    AssignTaskReviewArgs,
    json!({
        "type": "object",
        "properties": {
            "reviewer_id": {"type": "string"},
            "task_id": {"type": "string"},
            "implementer_id": {"type": "string"},
            "summary": {"type": "string"},
        },
        "required": ["reviewer_id", "task_id", "implementer_id", "summary"],
    }),
    |state, args| {
        let reviewer_id = args.reviewer_id.ok_or_else(|| missing("reviewer_id"))?;
        let task_id = args.task_id.ok_or_else(|| missing("task_id"))?;
        let implementer_id = args.implementer_id.ok_or_else(|| missing("implementer_id"))?;
        let summary = args.summary.unwrap_or_default();
        let message = state
            .assign_task_review(&reviewer_id, &task_id, &implementer_id, &summary)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(message))
    }
);

#[derive(Deserialize)]
struct AssignReviewFeedbackArgs {
    implementer_id: Option<String>,
    task_id: Option<String>,
    feedback: Option<String>,
}

simple_tool!(
    AssignReviewFeedbackTool,
    "assign_review_feedback",
    "Send denial feedback back to the implementer for another pass",
    AssignReviewFeedbackArgs,
    json!({
        "type": "object",
        "properties": {
            "implementer_id": {"type": "string"},
            "task_id": {"type": "string"},
            "feedback": {"type": "string"},
        },
        "required": ["implementer_id", "task_id", "feedback"],
    }),
    |state, args| {
        let implementer_id = args.implementer_id.ok_or_else(|| missing("implementer_id"))?;
        let task_id = args.task_id.ok_or_else(|| missing("task_id"))?;
        let feedback = args.feedback.ok_or_else(|| missing("feedback"))?;
        let message = state
            .assign_review_feedback(&implementer_id, &task_id, &feedback)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(message))
    }
);

#[derive(Deserialize)]
struct ApproveCommitArgs {
    implementer_id: Option<String>,
    task_id: Option<String>,
}

simple_tool!(
    ApproveCommitTool,
    "approve_commit",
    "Approve an implementer's commit for an approved task",
    ApproveCommitArgs,
    json!({
        "type": "object",
        "properties": {
            "implementer_id": {"type": "string"},
            "task_id": {"type": "string"},
        },
        "required": ["implementer_id", "task_id"],
    }),
    |state, args| {
        let implementer_id = args.implementer_id.ok_or_else(|| missing("implementer_id"))?;
        let task_id = args.task_id.ok_or_else(|| missing("task_id"))?;
        let message = state
            .approve_commit(&implementer_id, &task_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(message))
    }
);

#[derive(Deserialize)]
struct MarkTaskCompleteArgs {
    task_id: Option<String>,
}

simple_tool!(
    MarkTaskCompleteTool,
    "mark_task_complete",
    "Mark a committing task completed and close it out with the executor",
    MarkTaskCompleteArgs,
    json!({
        "type": "object",
        "properties": { "task_id": {"type": "string"} },
        "required": ["task_id"],
    }),
    |state, args| {
        let task_id = args.task_id.ok_or_else(|| missing("task_id"))?;
        let message = state.mark_task_complete(&task_id).await.map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(message))
    }
);

#[derive(Deserialize)]
struct MarkTaskFailedArgs {
    task_id: Option<String>,
    reason: Option<String>,
}

simple_tool!(
    MarkTaskFailedTool,
    "mark_task_failed",
    "Mark a task failed with a reason",
    MarkTaskFailedArgs,
    json!({
        "type": "object",
        "properties": {
            "task_id": {"type": "string"},
            "reason": {"type": "string"},
        },
        "required": ["task_id", "reason"],
    }),
    |state, args| {
        let task_id = args.task_id.ok_or_else(|| missing("task_id"))?;
        let reason = args.reason.ok_or_else(|| missing("reason"))?;
        let message = state
            .mark_task_failed(&task_id, &reason)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(message))
    }
);

#[derive(Deserialize, Default)]
struct ListWorkersArgs {}

simple_tool!(
    ListWorkersTool,
    "list_workers",
    "List every known worker with its pool and assignment state",
    ListWorkersArgs,
    json!({"type": "object", "properties": {}}),
    |state, _args| {
        let workers = state.list_workers().await;
        Ok(ToolCallResult::success_structured(
            format!("{} worker(s)", workers.len()),
            serde_json::to_value(workers).map_err(|e| e.to_string())?,
        ))
    }
);

#[derive(Deserialize, Default)]
struct QueryWorkerStateArgs {
    worker_id: Option<String>,
    task_id: Option<String>,
}

simple_tool!(
    QueryWorkerStateTool,
    "query_worker_state",
    "Query worker state, optionally filtered by worker_id and/or task_id",
    QueryWorkerStateArgs,
    json!({
        "type": "object",
        "properties": {
            "worker_id": {"type": "string"},
            "task_id": {"type": "string"},
        },
    }),
    |state, args| {
        let workers = state
            .query_worker_state(args.worker_id.as_deref(), args.task_id.as_deref())
            .await;
        Ok(ToolCallResult::success_structured(
            format!("{} worker(s)", workers.len()),
            serde_json::to_value(workers).map_err(|e| e.to_string())?,
        ))
    }
);

#[derive(Deserialize)]
struct SendToWorkerArgs {
    worker_id: Option<String>,
    message: Option<String>,
}

simple_tool!(
    SendToWorkerTool,
    "send_to_worker",
    "Send a message to a worker, delivered immediately if ready or queued otherwise",
    SendToWorkerArgs,
    json!({
        "type": "object",
        "properties": {
            "worker_id": {"type": "string"},
            "message": {"type": "string"},
        },
        "required": ["worker_id", "message"],
    }),
    |state, args| {
        let worker_id = args.worker_id.ok_or_else(|| missing("worker_id"))?;
        let message = args.message.ok_or_else(|| missing("message"))?;
        let outcome = state
            .send_to_worker(&worker_id, &message)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success_structured("message dispatched", outcome_json(outcome)))
    }
);

#[derive(Deserialize)]
struct PostMessageArgs {
    to: Option<String>,
    content: Option<String>,
}

simple_tool!(
    PostMessageTool,
    "post_message",
    "Post a coordinator-authored message to the shared log",
    PostMessageArgs,
    json!({
        "type": "object",
        "properties": {
            "to": {"type": "string"},
            "content": {"type": "string"},
        },
        "required": ["to", "content"],
    }),
    |state, args| {
        let to = args.to.ok_or_else(|| missing("to"))?;
        let content = args.content.ok_or_else(|| missing("content"))?;
        let entry = state.post_message(&to, &content).await;
        Ok(ToolCallResult::success_structured(
            "message posted",
            serde_json::to_value(entry).map_err(|e| e.to_string())?,
        ))
    }
);

#[derive(Deserialize, Default)]
struct ReadMessageLogArgs {
    limit: Option<usize>,
    #[serde(default)]
    read_all: bool,
}

simple_tool!(
    ReadMessageLogTool,
    "read_message_log",
    "Read unread (or, with read_all, every) entry in the shared message log",
    ReadMessageLogArgs,
    json!({
        "type": "object",
        "properties": {
            "limit": {"type": "integer"},
            "read_all": {"type": "boolean"},
        },
    }),
    |state, args| {
        let entries = state.read_message_log(args.limit, args.read_all).await;
        Ok(ToolCallResult::success_structured(
            format!("{} message(s)", entries.len()),
            json!({ "messages": entries }),
        ))
    }
);

#[derive(Deserialize)]
struct PrepareHandoffArgs {
    summary: Option<String>,
}

simple_tool!(
    PrepareHandoffTool,
    "prepare_handoff",
    "Broadcast a handoff summary to every agent",
    PrepareHandoffArgs,
    json!({
        "type": "object",
        "properties": { "summary": {"type": "string"} },
        "required": ["summary"],
    }),
    |state, args| {
        let summary = args.summary.ok_or_else(|| missing("summary"))?;
        let entry = state.prepare_handoff(&summary).await;
        Ok(ToolCallResult::success_structured(
            "handoff broadcast",
            serde_json::to_value(entry).map_err(|e| e.to_string())?,
        ))
    }
);

#[derive(Deserialize)]
struct ReplaceWorkerArgs {
    worker_id: Option<String>,
    reason: Option<String>,
}

simple_tool!(
    ReplaceWorkerTool,
    "replace_worker",
    "Retire an unresponsive worker, drain its queue, and register its replacement",
    ReplaceWorkerArgs,
    json!({
        "type": "object",
        "properties": {
            "worker_id": {"type": "string"},
            "reason": {"type": "string"},
        },
        "required": ["worker_id", "reason"],
    }),
    |state, args| {
        let worker_id = args.worker_id.ok_or_else(|| missing("worker_id"))?;
        let reason = args.reason.ok_or_else(|| missing("reason"))?;
        let replacement_id = state
            .replace_worker(&worker_id, &reason)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success_structured(
            format!("replaced {worker_id} with {replacement_id}"),
            json!({ "replacement_id": replacement_id }),
        ))
    }
);

#[derive(Deserialize, Default)]
struct DetectOrphanedTasksArgs {}

simple_tool!(
    DetectOrphanedTasksTool,
    "detect_orphaned_tasks",
    "List task ids assigned to a worker that is no longer active",
    DetectOrphanedTasksArgs,
    json!({"type": "object", "properties": {}}),
    |state, _args| {
        let orphaned = state.detect_orphaned_tasks().await;
        Ok(ToolCallResult::success_structured(
            format!("{} orphaned task(s)", orphaned.len()),
            json!({ "task_ids": orphaned }),
        ))
    }
);

#[derive(Deserialize, Default)]
struct CheckStuckWorkersArgs {}

simple_tool!(
    CheckStuckWorkersTool,
    "check_stuck_workers",
    "List worker ids that have exceeded the maximum task duration",
    CheckStuckWorkersArgs,
    json!({"type": "object", "properties": {}}),
    |state, _args| {
        let stuck = state.check_stuck_workers().await;
        Ok(ToolCallResult::success_structured(
            format!("{} stuck worker(s)", stuck.len()),
            json!({ "worker_ids": stuck }),
        ))
    }
);

/// Build every coordinator-facing tool, wired to one shared
/// [`CoordinatorState`].
pub fn all_tools(state: Arc<CoordinatorState>) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(AssignTaskTool::new(Arc::clone(&state))),
        Arc::new(AssignTaskReviewTool::new(Arc::clone(&state))),
        Arc::new(AssignReviewFeedbackTool::new(Arc::clone(&state))),
        Arc::new(ApproveCommitTool::new(Arc::clone(&state))),
        Arc::new(MarkTaskCompleteTool::new(Arc::clone(&state))),
        Arc::new(MarkTaskFailedTool::new(Arc::clone(&state))),
        Arc::new(ListWorkersTool::new(Arc::clone(&state))),
        Arc::new(QueryWorkerStateTool::new(Arc::clone(&state))),
        Arc::new(SendToWorkerTool::new(Arc::clone(&state))),
        Arc::new(PostMessageTool::new(Arc::clone(&state))),
        Arc::new(ReadMessageLogTool::new(Arc::clone(&state))),
        Arc::new(PrepareHandoffTool::new(Arc::clone(&state))),
        Arc::new(ReplaceWorkerTool::new(Arc::clone(&state))),
        Arc::new(DetectOrphanedTasksTool::new(Arc::clone(&state))),
        Arc::new(CheckStuckWorkersTool::new(state)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmctl_core::{NoopExecutor, NoopLlmDriver, QueueManager};
    use swarmctl_kernel::MessageLog;
    use swarmctl_pool::WorkerPool;

    async fn harness() -> (Arc<CoordinatorState>, CallContext) {
        let pool = WorkerPool::new();
        pool.register("worker-1", Some("sess-1".into())).unwrap();
        let llm = Arc::new(NoopLlmDriver);
        let qm = QueueManager::new(pool.clone(), llm.clone());
        qm.attach_to_pool().await;
        let log = Arc::new(MessageLog::new());
        let state = CoordinatorState::new(pool, qm, log, Arc::new(NoopExecutor), llm);
        let ctx = CallContext::new(crate::events::CallerRole::Coordinator, "COORDINATOR");
        (state, ctx)
    }

    #[tokio::test]
    async fn assign_task_tool_happy_path() {
        let (state, ctx) = harness().await;
        let tool = AssignTaskTool::new(Arc::clone(&state));
        let result = tool
            .call(&ctx, json!({"worker_id": "worker-1", "task_id": "abc-def.1"}))
            .await
            .unwrap();
        assert!(result.is_error.is_none());
    }

    #[tokio::test]
    async fn assign_task_tool_rejects_invalid_task_id() {
        let (state, ctx) = harness().await;
        let tool = AssignTaskTool::new(state);
        let err = tool
            .call(&ctx, json!({"worker_id": "worker-1", "task_id": "no"}))
            .await
            .unwrap_err();
        assert!(err.contains("invalid task_id"));
    }

    #[tokio::test]
    async fn list_workers_tool_reports_registered_worker() {
        let (state, ctx) = harness().await;
        let tool = ListWorkersTool::new(state);
        let result = tool.call(&ctx, json!({})).await.unwrap();
        let workers = result.structured_content.unwrap();
        assert_eq!(workers.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_tools_registers_every_coordinator_tool() {
        let (state, _ctx) = harness().await;
        assert_eq!(all_tools(state).len(), 15);
    }
}
