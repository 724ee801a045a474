//! JSON-RPC tool endpoint (`POST /mcp`)
//!
//! Stateless request/response: each POST carries one JSON-RPC request and gets
//! one response. Authentication and authorization failures are plain HTTP
//! errors; everything after that is reported as a JSON-RPC error object.

use crate::auth::{AccessDenied, Guard};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use todo_core::TodoError;
use todo_service::{AuthenticatedUser, Permission, TodoTools};
use tracing::{debug, warn};

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SERVER_NAME: &str = "todo-mcp-server";

/// JSON-RPC error codes
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// What a dispatched method produced
enum Outcome {
    Result(Value),
    Error(i64, String),
    /// Rejected by a guard; surfaces as an HTTP error
    Denied(Response),
}

/// Handle one JSON-RPC request from an authenticated caller
pub async fn handle_mcp(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body) {
        Err(e) => {
            debug!("Unparseable JSON-RPC body: {}", e);
            return rpc(JsonRpcResponse::failure(
                Value::Null,
                codes::PARSE_ERROR,
                "Parse error",
            ));
        }
        Ok(value) => match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                debug!("Malformed JSON-RPC request: {}", e);
                return rpc(JsonRpcResponse::failure(
                    Value::Null,
                    codes::INVALID_REQUEST,
                    "Invalid Request",
                ));
            }
        },
    };

    if request.jsonrpc != "2.0" {
        return rpc(JsonRpcResponse::failure(
            request.id.unwrap_or(Value::Null),
            codes::INVALID_REQUEST,
            "Invalid Request",
        ));
    }

    // Notifications get no response body
    let Some(id) = request.id else {
        debug!(method = %request.method, "Notification received");
        return StatusCode::ACCEPTED.into_response();
    };

    match dispatch(&state, &user, &request.method, request.params).await {
        Outcome::Result(result) => rpc(JsonRpcResponse::success(id, result)),
        Outcome::Error(code, message) => rpc(JsonRpcResponse::failure(id, code, message)),
        Outcome::Denied(response) => response,
    }
}

async fn dispatch(state: &AppState, user: &AuthenticatedUser, method: &str, params: Value) -> Outcome {
    match method {
        "initialize" => Outcome::Result(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Outcome::Result(json!({})),
        "tools/list" => {
            if let Err(denied) = state
                .authorizer
                .check(&Guard::Permission(Permission::ListTools), Some(user))
            {
                return Outcome::Denied(denied.into_response());
            }
            Outcome::Result(json!({ "tools": TodoTools::definitions() }))
        }
        "tools/call" => call_tool(state, user, params).await,
        other => {
            warn!(method = %other, "Unknown JSON-RPC method");
            Outcome::Error(codes::METHOD_NOT_FOUND, format!("Method not found: {}", other))
        }
    }
}

async fn call_tool(state: &AppState, user: &AuthenticatedUser, params: Value) -> Outcome {
    let params = serde_json::from_value::<CallToolParams>(params);

    // Unknown tools are rejected whoever the caller is
    if let Ok(CallToolParams { name, .. }) = &params {
        if state.permissions.required_permissions_for_tool(name).is_none() {
            warn!(tool = %name, "Unknown tool requested");
            return Outcome::Denied(AccessDenied::UnknownTool(name.clone()).into_response());
        }
    }

    if let Err(denied) = state
        .authorizer
        .check(&Guard::Permission(Permission::CallTools), Some(user))
    {
        return Outcome::Denied(denied.into_response());
    }

    let params = match params {
        Ok(params) => params,
        Err(e) => {
            return Outcome::Error(codes::INVALID_PARAMS, format!("Invalid params: {}", e));
        }
    };

    if let Err(denied) = state
        .authorizer
        .check(&Guard::Tool(params.name.clone()), Some(user))
    {
        return Outcome::Denied(denied.into_response());
    }

    match state.tools.call(&params.name, params.arguments).await {
        Ok(text) => Outcome::Result(json!({
            "content": [{ "type": "text", "text": text }],
        })),
        Err(TodoError::Validation { message, .. }) => Outcome::Error(codes::INVALID_PARAMS, message),
        Err(TodoError::UnknownTool { name, .. }) => {
            Outcome::Error(codes::METHOD_NOT_FOUND, format!("Tool \"{}\" not found.", name))
        }
        Err(e) => {
            e.log();
            Outcome::Error(codes::INTERNAL_ERROR, "Internal error".to_string())
        }
    }
}

fn rpc(response: JsonRpcResponse) -> Response {
    Json(response).into_response()
}
