//! The observer tool surface (C10): a read-only view over the message bus,
//! plus two write tools restricted to the `"observer"` channel.
//!
//! An observer is a third-party watching the swarm without participating
//! in task assignment; it may broadcast into (and reply within) the
//! `observer` channel only, so that channel becomes a place to leave notes
//! for human or tooling consumers without being mistaken for the main
//! coordinator/worker traffic on `ALL`/`COORDINATOR`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use swarmctl_core::{CoordinatorError, CoordinatorState};
use swarmctl_kernel::MessageKind;

use crate::handler::{CallContext, ToolHandler};
use crate::protocol::{ToolCallResult, ToolDefinition};

/// The only channel an observer may write into (§4.10).
pub const OBSERVER_CHANNEL: &str = "observer";

/// Read the full message log, optionally filtered to one channel. Unlike
/// the coordinator/worker surfaces, this never advances a read watermark
/// -- an observer's view is always the complete history, and re-reading it
/// must be idempotent.
pub struct ReadMessagesTool {
    state: Arc<CoordinatorState>,
}

impl ReadMessagesTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[derive(Deserialize, Default)]
struct ReadMessagesArgs {
    channel: Option<String>,
}

#[async_trait]
impl ToolHandler for ReadMessagesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_messages".into(),
            description: "Read the full message bus history, optionally filtered to one channel".into(),
            input_schema: json!({
                "type": "object",
                "properties": { "channel": {"type": "string"} },
            }),
            output_schema: None,
        }
    }

    async fn call(&self, _ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: ReadMessagesArgs = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let mut entries = self.state.message_log().entries().await;
        if let Some(channel) = &args.channel {
            entries.retain(|e| &e.to == channel || &e.from == channel);
        }
        let count = entries.len();
        Ok(ToolCallResult::success_structured(
            format!("{count} message(s)"),
            json!({ "messages": entries }),
        ))
    }
}

#[derive(Deserialize)]
struct FabricSendArgs {
    channel: Option<String>,
    content: Option<String>,
}

fn restricted_to_observer(channel: &str) -> Result<(), String> {
    if channel != OBSERVER_CHANNEL {
        return Err(CoordinatorError::ObserverChannelRestricted.to_string());
    }
    Ok(())
}

/// Broadcasts into the `observer` channel. Any other `channel` value is
/// rejected (§4.10).
pub struct FabricSendTool {
    state: Arc<CoordinatorState>,
}

impl FabricSendTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for FabricSendTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fabric_send".into(),
            description: "Send a message on a fabric channel (observer may only use `observer`)".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["channel", "content"],
            }),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: FabricSendArgs = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let channel = args.channel.ok_or_else(|| "missing required field `channel`".to_string())?;
        let content = args.content.ok_or_else(|| "missing required field `content`".to_string())?;
        restricted_to_observer(&channel)?;

        let entry = self
            .state
            .message_log()
            .append(&ctx.caller_id, OBSERVER_CHANNEL, content, MessageKind::Info)
            .await;
        Ok(ToolCallResult::success_structured(
            "sent to #observer",
            serde_json::to_value(entry).map_err(|e| e.to_string())?,
        ))
    }
}

#[derive(Deserialize)]
struct FabricReplyArgs {
    channel: Option<String>,
    content: Option<String>,
}

/// Replies within the `observer` channel. Any other `channel` value is
/// rejected -- the spec phrases this as "the target message's channel",
/// which for the append-only, channel-addressed log here is equivalent to
/// the reply's own destination channel.
pub struct FabricReplyTool {
    state: Arc<CoordinatorState>,
}

impl FabricReplyTool {
    pub fn new(state: Arc<CoordinatorState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ToolHandler for FabricReplyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fabric_reply".into(),
            description: "Reply within a fabric channel (observer may only reply in `observer`)".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["channel", "content"],
            }),
            output_schema: None,
        }
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
        let args: FabricReplyArgs = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
        let channel = args.channel.ok_or_else(|| "missing required field `channel`".to_string())?;
        let content = args.content.ok_or_else(|| "missing required field `content`".to_string())?;
        restricted_to_observer(&channel)?;

        let entry = self
            .state
            .message_log()
            .append(&ctx.caller_id, OBSERVER_CHANNEL, content, MessageKind::Info)
            .await;
        Ok(ToolCallResult::success_structured(
            "reply sent in #observer",
            serde_json::to_value(entry).map_err(|e| e.to_string())?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmctl_core::{NoopExecutor, NoopLlmDriver, QueueManager};
    use swarmctl_kernel::MessageLog;
    use swarmctl_pool::WorkerPool;

    async fn harness() -> (Arc<CoordinatorState>, CallContext) {
        let pool = WorkerPool::new();
        let llm = Arc::new(NoopLlmDriver);
        let qm = QueueManager::new(pool.clone(), llm.clone());
        qm.attach_to_pool().await;
        let log = Arc::new(MessageLog::new());
        let state = CoordinatorState::new(pool, qm, log, Arc::new(NoopExecutor), llm);
        let ctx = CallContext::new(crate::events::CallerRole::Observer, "observer-1");
        (state, ctx)
    }

    #[tokio::test]
    async fn fabric_send_to_observer_channel_succeeds() {
        let (state, ctx) = harness().await;
        let tool = FabricSendTool::new(Arc::clone(&state));
        tool.call(&ctx, json!({"channel": "observer", "content": "hi"}))
            .await
            .unwrap();
        assert_eq!(state.message_log().count().await, 1);
    }

    #[tokio::test]
    async fn fabric_send_to_other_channel_is_rejected() {
        let (state, ctx) = harness().await;
        let tool = FabricSendTool::new(Arc::clone(&state));
        let err = tool
            .call(&ctx, json!({"channel": "COORDINATOR", "content": "hi"}))
            .await
            .unwrap_err();
        assert!(err.contains("observer"));
        assert_eq!(state.message_log().count().await, 0);
    }

    #[tokio::test]
    async fn read_messages_does_not_advance_watermark() {
        let (state, ctx) = harness().await;
        state
            .message_log()
            .append("worker-1", swarmctl_kernel::message_log::ALL, "hi", MessageKind::Info)
            .await;
        let tool = ReadMessagesTool::new(Arc::clone(&state));
        tool.call(&ctx, json!({})).await.unwrap();
        let second = tool.call(&ctx, json!({})).await.unwrap();
        let count = second.structured_content.unwrap()["messages"].as_array().unwrap().len();
        assert_eq!(count, 1);
    }
}
