//! JSON-RPC request dispatcher.
//!
//! Turns one raw request body plus the presented credential into an HTTP
//! status and a response envelope. Every failure becomes an [`RpcError`]; nothing
//! escapes as an unstructured error.
//!
//! ## Supported methods
//!
//! | Method       | Params                                   | Result                       |
//! |--------------|------------------------------------------|------------------------------|
//! | `tools/list` | —                                        | `{tools: [...]}`             |
//! | `call_tool`  | `{tool, arguments: {device_id, ...}}`    | `{device, status}`           |
//!
//! ## Error codes
//!
//! | Code     | HTTP | Condition                                      |
//! |----------|------|------------------------------------------------|
//! | `401`    | 401  | missing or wrong API key                       |
//! | `-32700` | 400  | body is not a JSON-RPC envelope                |
//! | `-32602` | 400  | known tool called without `device_id`          |
//! | `-32601` | 404  | unknown method or unknown tool                 |

use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::auth::ApiKey;
use crate::bridge::DeviceLink;
use crate::tools::{Tool, ToolRegistry};

pub const JSONRPC_VERSION: &str = "2.0";

pub const UNAUTHORIZED: i64 = 401;
pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Inbound envelope. Every field is loosely typed: `jsonrpc` is not checked,
/// and a missing or non-string `method` is routed as "Method not found" with
/// the caller's id rather than failing the parse.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Value,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub method: Value,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(UNAUTHORIZED, "Unauthorized - missing/invalid API key")
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn tool_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Tool not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// HTTP status mirroring the error category.
    pub fn http_status(&self) -> StatusCode {
        match self.code {
            UNAUTHORIZED => StatusCode::UNAUTHORIZED,
            METHOD_NOT_FOUND => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Outbound envelope: exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Routes requests to the tool registry and the device link.
pub struct Dispatcher {
    api_key: ApiKey,
    tools: ToolRegistry,
    link: Arc<dyn DeviceLink>,
}

impl Dispatcher {
    pub fn new(api_key: ApiKey, tools: ToolRegistry, link: Arc<dyn DeviceLink>) -> Self {
        Self {
            api_key,
            tools,
            link,
        }
    }

    /// Handle one request. The credential is checked before the body is even
    /// looked at, so unauthorized responses always carry `id: null`.
    pub fn handle(&self, body: &[u8], credential: Option<&str>) -> (StatusCode, RpcResponse) {
        if !self.api_key.allows(credential) {
            warn!("RPC: rejected request with missing/invalid API key");
            return failure(Value::Null, RpcError::unauthorized());
        }

        let Some(request) = parse_envelope(body) else {
            debug!("RPC: unparseable request body ({} bytes)", body.len());
            return failure(Value::Null, RpcError::parse_error());
        };

        let id = request.id;
        let outcome = match request.method.as_str() {
            Some("tools/list") => Ok(json!({ "tools": self.tools.list() })),
            Some("call_tool") => self.call_tool(&request.params),
            _ => {
                debug!("RPC: unknown method {}", request.method);
                Err(RpcError::method_not_found())
            }
        };

        match outcome {
            Ok(result) => (StatusCode::OK, RpcResponse::success(id, result)),
            Err(error) => failure(id, error),
        }
    }

    fn call_tool(&self, params: &Value) -> Result<Value, RpcError> {
        let name = params.get("tool").and_then(Value::as_str).unwrap_or("");
        let Some(tool) = Tool::from_name(name) else {
            debug!("RPC: unknown tool '{name}'");
            return Err(RpcError::tool_not_found());
        };

        let empty = Map::new();
        let args = params
            .get("arguments")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let Some(raw) = args.get("device_id") else {
            return Err(RpcError::invalid_params(
                "Missing required parameter 'device_id'",
            ));
        };
        // Only presence is checked; non-string ids address the topic by their JSON text.
        let device = match raw {
            Value::String(d) => d.clone(),
            other => other.to_string(),
        };

        info!("RPC: call_tool {} device={device}", tool.name());
        let status = match tool.command() {
            Some(command) => {
                self.link.publish_command(&device, command);
                "requested".to_string()
            }
            None => self.link.read_status(&device),
        };
        Ok(json!({ "device": raw, "status": status }))
    }
}

/// Only a non-empty JSON object counts as an envelope.
fn parse_envelope(body: &[u8]) -> Option<RpcRequest> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match &value {
        Value::Object(map) if !map.is_empty() => serde_json::from_value(value).ok(),
        _ => None,
    }
}

fn failure(id: Value, error: RpcError) -> (StatusCode, RpcResponse) {
    (error.http_status(), RpcResponse::failure(id, error))
}
