//! The tool handler trait shared by the coordinator, worker, and observer
//! tool surfaces.

use async_trait::async_trait;
use serde_json::Value;

use crate::events::CallerRole;
use crate::protocol::{ToolCallResult, ToolDefinition};

/// Per-call context threaded through a handler: who called, with what
/// trace id, and (per §5) a cancellation signal the handler must observe
/// for long-running work.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub caller_role: CallerRole,
    pub caller_id: String,
    pub trace_id: Option<String>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl CallContext {
    pub fn new(caller_role: CallerRole, caller_id: impl Into<String>) -> Self {
        Self {
            caller_role,
            caller_id: caller_id.into(),
            trace_id: None,
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }
}

/// A single MCP tool. Handler errors become `ToolCallResult { is_error:
/// true }`, never an RPC-level error (§7) -- the `Err` variant here carries
/// the text body for that error result.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String>;
}
