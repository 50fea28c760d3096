//! MCP (Model Context Protocol) endpoint over Streamable HTTP.
//!
//! Stateless: each `POST` carries one JSON-RPC message and gets one JSON
//! response. Notifications are acknowledged with `202 Accepted`.

pub mod protocol;
pub mod tools;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use self::protocol::{
    negotiate_version, JsonRpcError, JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST,
    JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::state::AppState;

const SERVER_NAME: &str = "zimage";

const INSTRUCTIONS: &str = "Use the generate_image tool to create images from text prompts. \
    Only one image is generated at a time. If the tool reports that the model is still \
    loading or that another image is in progress, wait a few seconds and retry.";

/// Mount the MCP endpoint at `path`.
///
/// ```text
/// POST   {path}           -> handle
/// ```
pub fn router(path: &str) -> Router<AppState> {
    Router::new().route(path, post(handle))
}

/// POST {MCP_PATH}
async fn handle(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return reply(JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
            ))
        }
    };

    // Remember the id (if any) so a malformed request can still be answered.
    let raw_id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return reply(JsonRpcResponse::failure(
                raw_id,
                JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
            ))
        }
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return reply(JsonRpcResponse::failure(
            raw_id,
            JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        ));
    }

    if request.is_notification() {
        tracing::debug!(method = %request.method, "MCP notification");
        return StatusCode::ACCEPTED.into_response();
    }

    let id = request.id.clone().unwrap_or(Value::Null);
    tracing::debug!(method = %request.method, "MCP request");

    let outcome = match request.method.as_str() {
        "initialize" => Ok(initialize_result(request.params.as_ref())),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(tools::list()),
        "tools/call" => tools::call(&state, request.params).await,
        other => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    };

    reply(match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(id, error),
    })
}

fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);

    json!({
        "protocolVersion": negotiate_version(requested),
        "capabilities": {
            "tools": { "listChanged": false },
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "instructions": INSTRUCTIONS,
    })
}

fn reply(response: JsonRpcResponse) -> Response {
    (StatusCode::OK, Json(response)).into_response()
}
