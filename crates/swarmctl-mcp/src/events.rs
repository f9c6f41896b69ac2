//! The `McpEvent` published for every `tools/call`, and the optional
//! tracer hook that wraps each call in a span.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classifies an [`McpEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpEventKind {
    ToolResult,
    Error,
}

/// Published to the shared event broker after every `tools/call`,
/// successful or not (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpEvent {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub tool_name: String,
    pub request_json: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_json: Option<Value>,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub kind: McpEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Identifies who invoked a tool, for tracing and for the observer/worker
/// surfaces' authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Coordinator,
    Worker,
    Observer,
}

impl CallerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerRole::Coordinator => "coordinator",
            CallerRole::Worker => "worker",
            CallerRole::Observer => "observer",
        }
    }
}

/// Summary of one tool call, handed to a [`Tracer`] after the call
/// completes. Stands in for a full span API (§9): implementers that want
/// real spans open one at dispatch time and close it using these fields.
#[derive(Debug, Clone)]
pub struct SpanInfo {
    pub tool_name: String,
    pub caller_role: CallerRole,
    pub caller_id: String,
    pub trace_id: Option<String>,
    pub duration: Duration,
    pub is_error: bool,
}

/// A pluggable tracer. When set on [`crate::server::McpServer`], every tool
/// call is reported here under a span named `mcp.tool/<name>` worth of
/// attributes.
pub trait Tracer: Send + Sync {
    fn record(&self, info: SpanInfo);
}

/// A [`Tracer`] that forwards to `tracing::info_span`-style structured
/// logging. The default when no tracer is configured.
pub struct LoggingTracer;

impl Tracer for LoggingTracer {
    fn record(&self, info: SpanInfo) {
        tracing::debug!(
            span = %format!("mcp.tool/{}", info.tool_name),
            caller_role = info.caller_role.as_str(),
            caller_id = %info.caller_id,
            trace_id = info.trace_id.as_deref().unwrap_or(""),
            duration_ms = info.duration.as_millis() as u64,
            is_error = info.is_error,
            "tool call span"
        );
    }
}
