//! The two wire transports over which an [`McpServer`] is exposed:
//! newline-delimited JSON on a reader/writer, and a single Axum HTTP POST
//! handler. Both accept a bare JSON-RPC object; the HTTP transport also
//! accepts a batch array, matching `openintent-web`'s `handle_mcp_request`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use crate::server::McpServer;

/// Serve `server` over newline-delimited JSON, reading from `reader` and
/// writing responses (one per line) to `writer`. Reading is sequential:
/// one request is fully handled before the next line is read (§4.6).
pub async fn serve_stdio<R, W>(server: &McpServer, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => server.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                PARSE_ERROR,
                format!("failed to parse JSON-RPC request: {e}"),
            )),
        };
        if let Some(response) = response {
            let encoded = serde_json::to_string(&response)
                .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"failed to encode response"}}"#.to_string());
            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        // A request with no response (a notification) writes nothing at
        // all, including no trailing newline.
    }
    Ok(())
}

/// Build an Axum router exposing `server` at `path` via `POST`. Non-POST
/// methods fall through to Axum's default 405; body-read failures yield
/// `400`; a notification yields `204 No Content` with an empty body.
pub fn http_router(path: &str, server: Arc<McpServer>) -> Router {
    Router::new().route(path, post(handle_http_request)).with_state(server)
}

async fn handle_http_request(State(server): State<Arc<McpServer>>, body: String) -> Response {
    if let Ok(batch) = serde_json::from_str::<Vec<JsonRpcRequest>>(&body) {
        if batch.is_empty() {
            return Json(json!(JsonRpcResponse::error(
                None,
                crate::protocol::INVALID_REQUEST,
                "empty batch request",
            )))
            .into_response();
        }
        let mut responses = Vec::with_capacity(batch.len());
        for req in batch {
            if let Some(resp) = server.handle_request(req).await {
                responses.push(resp);
            }
        }
        return if responses.is_empty() {
            StatusCode::NO_CONTENT.into_response()
        } else {
            Json(json!(responses)).into_response()
        };
    }

    match serde_json::from_str::<JsonRpcRequest>(&body) {
        Ok(request) => match server.handle_request(request).await {
            Some(response) => Json(json!(response)).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!(JsonRpcResponse::error(
                None,
                PARSE_ERROR,
                format!("failed to parse JSON-RPC request: {e}"),
            ))),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CallerRole;
    use crate::server::ServerInfo;
    use swarmctl_kernel::Broker;
    use tokio::io::BufWriter;

    fn server() -> McpServer {
        McpServer::new(
            ServerInfo {
                name: "swarmctl".into(),
                version: "0.1.0".into(),
                instructions: None,
            },
            vec![],
            Broker::new(128),
            CallerRole::Coordinator,
            "COORDINATOR",
        )
    }

    #[tokio::test]
    async fn stdio_notification_writes_nothing() {
        let server = server();
        let input = b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n".to_vec();
        let mut output = Vec::new();
        {
            let writer = BufWriter::new(&mut output);
            serve_stdio(&server, input.as_slice(), writer).await.unwrap();
        }
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn stdio_request_writes_one_line_response() {
        let server = server();
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec();
        let mut output = Vec::new();
        {
            let writer = BufWriter::new(&mut output);
            serve_stdio(&server, input.as_slice(), writer).await.unwrap();
        }
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        let parsed: JsonRpcResponse = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed.id, Some(json!(1)));
    }
}
