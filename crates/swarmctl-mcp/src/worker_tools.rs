//! The worker-facing tool surface (C9): `check_messages`, `post_message`,
//! `signal_ready`, `signal_coordinator`, `report_implementation_complete`,
//! `report_review_verdict`.
//!
//! Every handler here treats the calling [`CallContext::caller_id`] as the
//! worker's own id -- the MCP server mounted at `/worker/<id>` is
//! constructed with `caller_id = <id>`, so a worker can only ever act as
//! itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use swarmctl_core::{CoordinatorState, ReviewVerdict};
use swarmctl_kernel::message_log::{ALL, COORDINATOR};
use swarmctl_kernel::{Deduplicator, MessageKind};

use crate::handler::{CallContext, ToolHandler};
use crate::protocol::{ToolCallResult, ToolDefinition};

fn missing(field: &str) -> String {
    format!("missing required field `{field}`")
}

/// Lists unread entries addressed to the calling worker (directly, or via
/// the `ALL` channel), then advances its read watermark.
pub struct CheckMessagesTool {
    state: Arc<CoordinatorState>,
}

impl CheckMessagesTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for CheckMessagesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "check_messages".into(),
            description: "List unread messages addressed to this worker".into(),
            input_schema: json!({"type": "object", "properties": {}}),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, _arguments: Value) -> Result<ToolCallResult, String> {
        let unread = self.state.message_log().unread_for(&ctx.caller_id).await;
        self.state.message_log().mark_read(&ctx.caller_id).await;
        let structured = json!({ "unread_count": unread.len(), "messages": unread });
        Ok(ToolCallResult::success_structured(
            format!("{} unread message(s)", unread.len()),
            structured,
        ))
    }
}

#[derive(Deserialize)]
struct PostMessageArgs {
    to: Option<String>,
    content: Option<String>,
}

/// Posts a worker-authored message to the shared log. De-duplicated on
/// `(worker_id, content)` within the TTL window -- an LLM that retries a
/// tool call after a transient error must not post the same content twice.
pub struct PostMessageTool {
    state: Arc<CoordinatorState>,
    dedup: Arc<Deduplicator>,
}

impl PostMessageTool {
    pub fn new(state: Arc<CoordinatorState>, dedup: Arc<Deduplicator>) -> Self {
        Self { state, dedup }
    }
}

#[async_trait]
impl ToolHandler for PostMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "post_message".into(),
            description: "Post a message to another agent or the whole swarm".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["to", "content"],
            }),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: PostMessageArgs = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let to = args.to.ok_or_else(|| missing("to"))?;
        let content = args.content.ok_or_else(|| missing("content"))?;

        if self.dedup.is_duplicate(&ctx.caller_id, &content).await {
            return Ok(ToolCallResult::success("duplicate message within TTL window, not re-posted"));
        }

        let entry = self
            .state
            .message_log()
            .append(&ctx.caller_id, &to, &content, MessageKind::Info)
            .await;
        Ok(ToolCallResult::success_structured(
            "message posted",
            serde_json::to_value(entry).map_err(|e| e.to_string())?,
        ))
    }
}

/// Announces that a newly-spawned worker is ready to receive work. Never
/// deduplicated -- a worker only signals readiness once per spawn, and a
/// dropped announcement would leave it permanently invisible to assignment.
pub struct SignalReadyTool {
    state: Arc<CoordinatorState>,
}

impl SignalReadyTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for SignalReadyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "signal_ready".into(),
            description: "Announce that this worker is ready for assignment".into(),
            input_schema: json!({"type": "object", "properties": {}}),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, _arguments: Value) -> Result<ToolCallResult, String> {
        self.state
            .message_log()
            .append(&ctx.caller_id, ALL, format!("{} is ready", ctx.caller_id), MessageKind::WorkerReady)
            .await;
        Ok(ToolCallResult::success("ready signal broadcast"))
    }
}

#[derive(Deserialize)]
struct SignalCoordinatorArgs {
    reason: Option<String>,
}

/// Raises an urgent, unmissable flag to the coordinator. Never
/// deduplicated -- a worker stuck in a loop calling this repeatedly is
/// itself diagnostic signal, not noise to collapse.
pub struct SignalCoordinatorTool {
    state: Arc<CoordinatorState>,
}

impl SignalCoordinatorTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for SignalCoordinatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "signal_coordinator".into(),
            description: "Raise an urgent flag directly to the coordinator".into(),
            input_schema: json!({
                "type": "object",
                "properties": { "reason": {"type": "string"} },
                "required": ["reason"],
            }),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: SignalCoordinatorArgs =
            serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let reason = args.reason.ok_or_else(|| missing("reason"))?;
        self.state
            .message_log()
            .append(&ctx.caller_id, COORDINATOR, reason, MessageKind::Urgent)
            .await;
        Ok(ToolCallResult::success("coordinator signaled"))
    }
}

#[derive(Deserialize)]
struct ReportImplementationCompleteArgs {
    summary: Option<String>,
}

/// Transitions a worker from `implementing`/`addressing_feedback` to
/// `awaiting_review`. Rejected outside those phases (§4.7).
pub struct ReportImplementationCompleteTool {
    state: Arc<CoordinatorState>,
}

impl ReportImplementationCompleteTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for ReportImplementationCompleteTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "report_implementation_complete".into(),
            description: "Report that implementation work on the assigned task is done".into(),
            input_schema: json!({
                "type": "object",
                "properties": { "summary": {"type": "string"} },
                "required": ["summary"],
            }),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: ReportImplementationCompleteArgs =
            serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let summary = args.summary.ok_or_else(|| missing("summary"))?;
        self.state
            .on_implementation_complete(&ctx.caller_id, &summary)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success("implementation reported complete, awaiting review"))
    }
}

#[derive(Deserialize)]
struct ReportReviewVerdictArgs {
    verdict: Option<ReviewVerdict>,
    comments: Option<String>,
}

/// Transitions a worker out of `reviewing`, recording the verdict on the
/// task. Rejected unless the worker's phase is `reviewing` (§4.7).
pub struct ReportReviewVerdictTool {
    state: Arc<CoordinatorState>,
}

impl ReportReviewVerdictTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for ReportReviewVerdictTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "report_review_verdict".into(),
            description: "Report the outcome of a code review".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "verdict": {"type": "string", "enum": ["approved", "denied"]},
                    "comments": {"type": "string"},
                },
                "required": ["verdict", "comments"],
            }),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: ReportReviewVerdictArgs =
            serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let verdict = args.verdict.ok_or_else(|| missing("verdict"))?;
        let comments = args.comments.ok_or_else(|| missing("comments"))?;
        self.state
            .on_review_verdict(&ctx.caller_id, verdict, &comments)
            .await
            .map_err(|e| e.to_string())?;
        Ok(ToolCallResult::success(format!("review verdict ({verdict:?}) recorded")))
    }
}
