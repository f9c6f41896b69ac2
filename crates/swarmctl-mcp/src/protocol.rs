//! JSON-RPC 2.0 / MCP wire types.
//!
//! Mirrors the shape used by the wider workspace's own MCP server
//! (`JsonRpcRequest`/`JsonRpcResponse`/`JsonRpcError`), generalized with the
//! domain error codes this spec adds on top of the standard JSON-RPC ones.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The MCP protocol version this server implements.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Domain error codes (§6).
pub const TOOL_NOT_FOUND: i32 = -32001;
pub const TOOL_EXEC_FAILED: i32 = -32002;
pub const RESOURCE_NOT_FOUND: i32 = -32003;

/// A JSON-RPC 2.0 request. `id` absent or `null` marks a notification,
/// which must never produce a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none() || self.id.as_ref() == Some(&Value::Null)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// An MCP tool definition as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// A single content block within a tool call result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            content_type: "text".into(),
            text: value.into(),
        }
    }
}

/// The result of a `tools/call` invocation: either success or a tool-level
/// error (never an RPC-level error -- see §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl ToolCallResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: None,
            structured_content: None,
        }
    }

    pub fn success_structured(text: impl Into<String>, structured: Value) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: None,
            structured_content: Some(structured),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: Some(true),
            structured_content: None,
        }
    }

    /// Attach a `trace_id` to the structured content, creating an empty
    /// object if none was set, so the caller can correlate the call (§4.6).
    pub fn with_trace_id(mut self, trace_id: Option<&str>) -> Self {
        if let Some(trace_id) = trace_id {
            let mut structured = self.structured_content.take().unwrap_or_else(|| json!({}));
            if let Value::Object(map) = &mut structured {
                map.insert("trace_id".to_string(), json!(trace_id));
            }
            self.structured_content = Some(structured);
        }
        self
    }
}

/// Extract a `trace_id` from tool arguments, tolerating both the flat
/// (`arguments.trace_id`) and nested (`arguments.trace_context.trace_id`)
/// shapes (§9).
pub fn extract_trace_id(arguments: &Value) -> Option<String> {
    arguments
        .get("trace_id")
        .and_then(|v| v.as_str())
        .or_else(|| {
            arguments
                .get("trace_context")
                .and_then(|tc| tc.get("trace_id"))
                .and_then(|v| v.as_str())
        })
        .map(str::to_string)
}
