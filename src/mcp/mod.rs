//! Model Context Protocol endpoint for AI agents.
//!
//! Stateless JSON-RPC over HTTP: each `POST /mcp` carries one message and,
//! unless it is a notification, gets one JSON response back.
//!
//! ```text
//! initialize       → server info + tool capability
//! tools/list       → tool definitions with input/output schemas
//! tools/call       → run a tool against the reading store
//! ping             → {}
//! notifications/*  → 202, no body
//! ```

pub mod protocol;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use tools::{CallToolParams, Content, ToolDefinition, ToolResult};

use crate::server::ServerState;
use crate::store::ReadingStore;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "heart-rate";

/// Protocol revision used when the client does not ask for one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Outcome of handling one message.
#[derive(Debug)]
pub enum Reply {
    /// A response to send with the given HTTP status
    Response(StatusCode, JsonRpcResponse),
    /// A notification was accepted; nothing to send
    Accepted,
}

/// Handle one raw JSON-RPC message.
pub fn handle_message(store: &ReadingStore, body: &[u8]) -> Reply {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("unparseable MCP message: {e}");
            return Reply::Response(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error()),
            );
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Reply::Response(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)),
            );
        }
    };

    if request.jsonrpc != protocol::JSONRPC_VERSION {
        return Reply::Response(
            StatusCode::BAD_REQUEST,
            JsonRpcResponse::failure(id, JsonRpcError::invalid_request("jsonrpc must be \"2.0\"")),
        );
    }

    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification received");
        return Reply::Accepted;
    }

    let id = request.id.clone().unwrap_or(Value::Null);
    match dispatch(store, &request.method, request.params.as_ref()) {
        Ok(result) => Reply::Response(StatusCode::OK, JsonRpcResponse::success(id, result)),
        Err(error) => {
            let status = if error.code == protocol::INTERNAL_ERROR {
                tracing::error!(method = %request.method, "MCP request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                tracing::warn!(method = %request.method, "{error}");
                StatusCode::OK
            };
            Reply::Response(status, JsonRpcResponse::failure(id, error))
        }
    }
}

/// Route a request to its method handler.
pub fn dispatch(
    store: &ReadingStore,
    method: &str,
    params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    match method {
        "initialize" => Ok(initialize(params)),
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools = serde_json::to_value(tools::definitions()).map_err(|e| {
                tracing::error!("Failed to serialize tool list: {e}");
                JsonRpcError::internal()
            })?;
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => {
            let params: CallToolParams = params
                .cloned()
                .ok_or_else(|| JsonRpcError::invalid_params("missing params"))
                .and_then(|p| serde_json::from_value(p).map_err(JsonRpcError::invalid_params))?;

            let result = tools::call(store, &params.name, params.arguments.as_ref())?;
            serde_json::to_value(result).map_err(|e| {
                tracing::error!("Failed to serialize tool result: {e}");
                JsonRpcError::internal()
            })
        }
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn initialize(params: Option<&Value>) -> Value {
    let protocol_version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    json!({
        "protocolVersion": protocol_version,
        "capabilities": {"tools": {}},
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// POST /mcp
pub async fn endpoint(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    match handle_message(&state.store, &body) {
        Reply::Response(status, response) => (status, Json(response)).into_response(),
        Reply::Accepted => StatusCode::ACCEPTED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(store: &ReadingStore, message: Value) -> (StatusCode, JsonRpcResponse) {
        match handle_message(store, message.to_string().as_bytes()) {
            Reply::Response(status, response) => (status, response),
            Reply::Accepted => panic!("expected a response"),
        }
    }

    #[test]
    fn test_initialize() {
        let store = ReadingStore::default();
        let (status, response) = send(
            &store,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2024-11-05"}}),
        );

        assert_eq!(status, StatusCode::OK);
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn test_tools_list() {
        let store = ReadingStore::default();
        let (_, response) = send(&store, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}));

        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools.as_array().unwrap().len(), 4);
        assert_eq!(tools[0]["name"], "checkConnection");
    }

    #[test]
    fn test_tools_call() {
        let store = ReadingStore::default();
        let (status, response) = send(
            &store,
            json!({"jsonrpc": "2.0", "id": "abc", "method": "tools/call",
                   "params": {"name": "checkConnection", "arguments": {"pairingCode": "falcon99"}}}),
        );

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.id, json!("abc"));
        let result = response.result.unwrap();
        assert_eq!(
            result["structuredContent"],
            json!({"connected": false, "lastSeen": null, "status": "disconnected"})
        );
        assert!(result.get("isError").is_none());
    }

    #[test]
    fn test_tools_call_without_name() {
        let store = ReadingStore::default();
        let (_, response) = send(
            &store,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {}}),
        );
        assert_eq!(response.error.unwrap().code, protocol::INVALID_PARAMS);
    }

    #[test]
    fn test_method_not_found() {
        let store = ReadingStore::default();
        let (status, response) = send(
            &store,
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/list"}),
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.error.unwrap().code, protocol::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_notification_accepted() {
        let store = ReadingStore::default();
        let message = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(matches!(
            handle_message(&store, message.to_string().as_bytes()),
            Reply::Accepted
        ));
    }

    #[test]
    fn test_null_id_gets_response() {
        let store = ReadingStore::default();
        let (status, response) = send(&store, json!({"jsonrpc": "2.0", "id": null, "method": "ping"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.result, Some(json!({})));
    }

    #[test]
    fn test_parse_error() {
        let store = ReadingStore::default();
        match handle_message(&store, b"{not json") {
            Reply::Response(status, response) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(response.id, Value::Null);
                assert_eq!(response.error.unwrap().code, protocol::PARSE_ERROR);
            }
            Reply::Accepted => panic!("expected a response"),
        }
    }

    #[test]
    fn test_invalid_request() {
        let store = ReadingStore::default();
        let (status, response) = send(&store, json!({"jsonrpc": "1.0", "id": 5, "method": "ping"}));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.id, json!(5));
        assert_eq!(response.error.unwrap().code, protocol::INVALID_REQUEST);

        let (_, response) = send(&store, json!([1, 2, 3]));
        assert_eq!(response.error.unwrap().code, protocol::INVALID_REQUEST);
    }
}
