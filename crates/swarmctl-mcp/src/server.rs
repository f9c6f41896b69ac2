//! The generic JSON-RPC/MCP dispatcher (C6).
//!
//! One [`McpServer`] instance backs one MCP surface (coordinator, a given
//! worker, or the observer) -- each gets its own handler set, but all three
//! share the same dispatch and event-publication logic generalized here.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use swarmctl_kernel::Broker;

use crate::events::{CallerRole, McpEvent, McpEventKind, SpanInfo, Tracer};
use crate::handler::{CallContext, ToolHandler};
use crate::protocol::{
    extract_trace_id, JsonRpcRequest, JsonRpcResponse, ToolCallResult,
    ToolDefinition, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, MCP_PROTOCOL_VERSION,
    TOOL_NOT_FOUND,
};

/// Implementation info reported on `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

/// The generic MCP/JSON-RPC server: holds a tool registry, publishes
/// `McpEvent`s for every `tools/call`, and optionally spans each call
/// through a [`Tracer`].
pub struct McpServer {
    info: ServerInfo,
    tools: Vec<Arc<dyn ToolHandler>>,
    events: Broker<McpEvent>,
    tracer: Option<Arc<dyn Tracer>>,
    caller_role: CallerRole,
    caller_id: String,
}

impl McpServer {
    pub fn new(
        info: ServerInfo,
        tools: Vec<Arc<dyn ToolHandler>>,
        events: Broker<McpEvent>,
        caller_role: CallerRole,
        caller_id: impl Into<String>,
    ) -> Self {
        Self {
            info,
            tools,
            events,
            tracer: None,
            caller_role,
            caller_id: caller_id.into(),
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn events(&self) -> &Broker<McpEvent> {
        &self.events
    }

    /// Handle one JSON-RPC request. Returns `None` for notifications, which
    /// must produce no response at the transport layer.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.is_notification();
        tracing::debug!(method = %request.method, notification = is_notification, "mcp request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id.clone()),
            "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
            "tools/list" => self.handle_tools_list(request.id.clone()),
            "tools/call" => self.handle_tools_call(request.id.clone(), request.params).await,
            "notifications/initialized" | "notifications/cancelled" => {
                return None;
            }
            other => {
                tracing::warn!(method = %other, "unknown mcp method");
                JsonRpcResponse::error(
                    request.id.clone(),
                    METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                )
            }
        };

        if is_notification {
            None
        } else {
            Some(response)
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let mut result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            }
        });
        if let Some(instructions) = &self.info.instructions {
            result["instructions"] = json!(instructions);
        }
        JsonRpcResponse::success(id, result)
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<ToolDefinition> = self.tools.iter().map(|t| t.definition()).collect();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_owned(),
            None => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "missing required field `name` in params",
                );
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let Some(handler) = self.tools.iter().find(|t| t.definition().name == name) else {
            return JsonRpcResponse::error(
                id,
                TOOL_NOT_FOUND,
                format!("tool not found: {name}"),
            );
        };

        let trace_id = extract_trace_id(&arguments);
        let ctx = CallContext::new(self.caller_role, self.caller_id.clone())
            .with_trace_id(trace_id.clone());

        let start = Instant::now();
        let outcome = handler.call(&ctx, arguments.clone()).await;
        let duration = start.elapsed();

        let (result, is_error, error_text) = match outcome {
            Ok(result) => {
                let result = result.with_trace_id(trace_id.as_deref());
                (result, false, None)
            }
            Err(msg) => (ToolCallResult::error(&msg), true, Some(msg)),
        };

        let response_json = serde_json::to_value(&result).ok();
        self.events.publish(McpEvent {
            timestamp: chrono::Utc::now(),
            method: "tools/call".to_string(),
            tool_name: name.clone(),
            request_json: arguments,
            response_json: response_json.clone(),
            duration,
            trace_id: trace_id.clone(),
            kind: if is_error {
                McpEventKind::Error
            } else {
                McpEventKind::ToolResult
            },
            error: error_text,
        });

        if let Some(tracer) = &self.tracer {
            tracer.record(SpanInfo {
                tool_name: name,
                caller_role: self.caller_role,
                caller_id: self.caller_id.clone(),
                trace_id,
                duration,
                is_error,
            });
        }

        match response_json {
            Some(v) => JsonRpcResponse::success(id, v),
            None => JsonRpcResponse::error(id, INTERNAL_ERROR, "failed to serialize tool result"),
        }
    }
}

/// Errors returned directly at the JSON-RPC layer (parse failures), never
/// reaching a tool handler.
pub fn parse_error_response(err: impl std::fmt::Display) -> JsonRpcResponse {
    JsonRpcResponse::error(
        None,
        crate::protocol::PARSE_ERROR,
        format!("failed to parse JSON-RPC request: {err}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes input".into(),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            }
        }

        async fn call(&self, _ctx: &CallContext, arguments: Value) -> Result<ToolCallResult, String> {
            Ok(ToolCallResult::success(arguments.to_string()))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "fail".into(),
                description: "always fails".into(),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            }
        }

        async fn call(&self, _ctx: &CallContext, _arguments: Value) -> Result<ToolCallResult, String> {
            Err("intentional failure".to_string())
        }
    }

    fn server(tools: Vec<Arc<dyn ToolHandler>>) -> McpServer {
        McpServer::new(
            ServerInfo {
                name: "swarmctl".into(),
                version: "0.1.0".into(),
                instructions: None,
            },
            tools,
            Broker::new(128),
            CallerRole::Coordinator,
            "COORDINATOR",
        )
    }

    fn request(id: Value, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let server = server(vec![]);
        let resp = server
            .handle_request(request(json!(1), "initialize", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.result.unwrap()["protocolVersion"], MCP_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn notification_produces_no_response() {
        let server = server(vec![]);
        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: None,
            method: "notifications/initialized".into(),
            params: json!(null),
        };
        assert!(server.handle_request(req).await.is_none());
    }

    #[tokio::test]
    async fn tools_list_returns_registered_tools() {
        let server = server(vec![Arc::new(EchoTool)]);
        let resp = server
            .handle_request(request(json!(2), "tools/list", json!(null)))
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 1);
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_is_domain_error() {
        let server = server(vec![]);
        let resp = server
            .handle_request(request(
                json!(3),
                "tools/call",
                json!({"name": "ghost", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, TOOL_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_handler_error_is_result_not_rpc_error() {
        let server = server(vec![Arc::new(FailingTool)]);
        let resp = server
            .handle_request(request(
                json!(4),
                "tools/call",
                json!({"name": "fail", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
    }

    #[tokio::test]
    async fn trace_id_is_echoed_into_structured_content() {
        let server = server(vec![Arc::new(EchoTool)]);
        let resp = server
            .handle_request(request(
                json!(5),
                "tools/call",
                json!({"name": "echo", "arguments": {"trace_id": "abc-123"}}),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["structuredContent"]["trace_id"], "abc-123");
    }

    #[tokio::test]
    async fn nested_trace_context_is_also_recognized() {
        let server = server(vec![Arc::new(EchoTool)]);
        let resp = server
            .handle_request(request(
                json!(6),
                "tools/call",
                json!({"name": "echo", "arguments": {"trace_context": {"trace_id": "xyz"}}}),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["structuredContent"]["trace_id"], "xyz");
    }

    #[tokio::test]
    async fn every_tools_call_publishes_an_event() {
        let server = server(vec![Arc::new(EchoTool)]);
        let mut sub = server.events().subscribe();
        server
            .handle_request(request(
                json!(7),
                "tools/call",
                json!({"name": "echo", "arguments": {}}),
            ))
            .await;
        let event = sub.recv().await.unwrap();
        assert_eq!(event.tool_name, "echo");
        assert_eq!(event.kind, McpEventKind::ToolResult);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = server(vec![]);
        let resp = server
            .handle_request(request(json!(8), "bogus", json!(null)))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }
}
