//! JSON-RPC/MCP server (C6) and the three tool surfaces that sit on top of
//! it: coordinator-facing, worker-facing (C9), and observer-facing (C10).
//!
//! One [`server::McpServer`] instance backs one MCP endpoint; the
//! coordinator, each worker, and the observer each get their own instance
//! (distinguished by `caller_role`/`caller_id` and the tool set registered
//! on construction), all sharing the same underlying
//! `swarmctl_core::CoordinatorState`.

pub mod coordinator_tools;
pub mod events;
pub mod handler;
pub mod mcp_config;
pub mod observer_tools;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod worker_tools;

pub use events::{CallerRole, LoggingTracer, McpEvent, McpEventKind, SpanInfo, Tracer};
pub use handler::{CallContext, ToolHandler};
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallResult, ToolContent, ToolDefinition,
    MCP_PROTOCOL_VERSION,
};
pub use server::{McpServer, ServerInfo};
pub use transport::{http_router, serve_stdio};

use std::sync::Arc;

use swarmctl_core::CoordinatorState;
use swarmctl_kernel::{Broker, Deduplicator};

/// Build the coordinator's own MCP server: every `coordinator_tools` tool,
/// with `caller_role = Coordinator`.
pub fn build_coordinator_server(state: Arc<CoordinatorState>, info: ServerInfo) -> McpServer {
    let tools = coordinator_tools::all_tools(Arc::clone(&state));
    McpServer::new(info, tools, Broker::new(128), CallerRole::Coordinator, "COORDINATOR")
}

/// Build the MCP server mounted for one specific worker: every
/// `worker_tools` tool, with `caller_role = Worker` and `caller_id =
/// worker_id`, so the worker can only ever act as itself.
pub fn build_worker_server(
    state: Arc<CoordinatorState>,
    dedup: Arc<Deduplicator>,
    worker_id: impl Into<String>,
    info: ServerInfo,
) -> McpServer {
    let worker_id = worker_id.into();
    let tools: Vec<Arc<dyn ToolHandler>> = vec![
        Arc::new(worker_tools::CheckMessagesTool::new(Arc::clone(&state))),
        Arc::new(worker_tools::PostMessageTool::new(Arc::clone(&state), dedup)),
        Arc::new(worker_tools::SignalReadyTool::new(Arc::clone(&state))),
        Arc::new(worker_tools::SignalCoordinatorTool::new(Arc::clone(&state))),
        Arc::new(worker_tools::ReportImplementationCompleteTool::new(Arc::clone(&state))),
        Arc::new(worker_tools::ReportReviewVerdictTool::new(state)),
    ];
    McpServer::new(info, tools, Broker::new(128), CallerRole::Worker, worker_id)
}

/// Build the read-mostly observer MCP server: `read_messages`,
/// `fabric_send`, and `fabric_reply`, with `caller_role = Observer`.
pub fn build_observer_server(state: Arc<CoordinatorState>, info: ServerInfo) -> McpServer {
    let tools: Vec<Arc<dyn ToolHandler>> = vec![
        Arc::new(observer_tools::ReadMessagesTool::new(Arc::clone(&state))),
        Arc::new(observer_tools::FabricSendTool::new(Arc::clone(&state))),
        Arc::new(observer_tools::FabricReplyTool::new(state)),
    ];
    McpServer::new(info, tools, Broker::new(128), CallerRole::Observer, "observer")
}
