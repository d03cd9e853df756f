//! Stdio JSON-RPC loop implementing the MCP wire protocol.
//!
//! One JSON-RPC message per line on stdin, one response per line on stdout.
//! Logging goes to stderr only; stdout carries nothing but protocol frames.

use crate::error::PickyError;
use crate::manager::RestaurantManager;
use crate::mcp;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const NOT_FOUND: i64 = -32001;
const INTERNAL_ERROR: i64 = -32000;

/// Serve MCP over stdio until stdin closes.
pub async fn run(manager: Arc<RestaurantManager>) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    tracing::info!("picky MCP server listening on stdio");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let Some(response) = handle_line(&manager, &line).await else {
            continue; // notification, no response
        };
        let mut framed = serde_json::to_string(&response)?;
        framed.push('\n');
        stdout.write_all(framed.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

async fn handle_line(manager: &RestaurantManager, line: &str) -> Option<Value> {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Some(error_response(
                Value::Null,
                PARSE_ERROR,
                &format!("parse error: {e}"),
                None,
            ));
        }
    };

    let method = request["method"].as_str().unwrap_or("");
    let params = request["params"].clone();
    let id = request["id"].clone();

    // Notifications carry no id and get no response.
    if id.is_null() && method.starts_with("notifications/") {
        return None;
    }

    let result = dispatch(manager, method, params).await;
    Some(match result {
        Ok(value) => json!({ "jsonrpc": "2.0", "id": id, "result": value }),
        Err(err) => {
            let (code, kind) = match &err {
                DispatchError::UnknownMethod(_) => (METHOD_NOT_FOUND, None),
                DispatchError::Tool(e) => (code_for(e), Some(e.kind())),
            };
            error_response(id, code, &err.to_string(), kind)
        }
    })
}

fn code_for(err: &PickyError) -> i64 {
    match err {
        PickyError::Validation(_) => INVALID_PARAMS,
        PickyError::NotFound(_) => NOT_FOUND,
        _ => INTERNAL_ERROR,
    }
}

fn error_response(id: Value, code: i64, message: &str, kind: Option<&str>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(kind) = kind {
        error["data"] = json!({ "kind": kind });
    }
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error(transparent)]
    Tool(#[from] PickyError),
}

async fn dispatch(
    manager: &RestaurantManager,
    method: &str,
    params: Value,
) -> std::result::Result<Value, DispatchError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {},
            },
            "serverInfo": {
                "name": "picky",
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": mcp::get_tools() })),
        "tools/call" => {
            let name = params["name"].as_str().ok_or_else(|| {
                DispatchError::Tool(PickyError::Validation("tool name is required".into()))
            })?;
            let args = if params["arguments"].is_object() {
                params["arguments"].clone()
            } else {
                json!({})
            };
            tracing::info!(tool = name, "tool call");
            let result = mcp::call_tool(manager, name, args).await?;
            Ok(json!({
                "content": [{
                    "type": "text",
                    "text": serde_json::to_string_pretty(&result)
                        .unwrap_or_else(|_| result.to_string()),
                }],
            }))
        }
        "resources/list" => Ok(json!({ "resources": mcp::get_resources() })),
        "resources/read" => {
            let uri = params["uri"].as_str().ok_or_else(|| {
                DispatchError::Tool(PickyError::Validation("resource uri is required".into()))
            })?;
            tracing::info!(uri, "resource read");
            let result = mcp::read_resource(manager, uri).await?;
            Ok(json!({
                "contents": [{
                    "uri": uri,
                    "mimeType": "application/json",
                    "text": serde_json::to_string_pretty(&result)
                        .unwrap_or_else(|_| result.to_string()),
                }],
            }))
        }
        other => Err(DispatchError::UnknownMethod(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_track_kinds() {
        assert_eq!(code_for(&PickyError::Validation("x".into())), INVALID_PARAMS);
        assert_eq!(code_for(&PickyError::NotFound("x".into())), NOT_FOUND);
        assert_eq!(code_for(&PickyError::transient("notion", "x")), INTERNAL_ERROR);
        assert_eq!(
            code_for(&PickyError::QuotaExceeded("maps".into())),
            INTERNAL_ERROR
        );
    }

    #[test]
    fn test_error_response_carries_kind() {
        let resp = error_response(json!(7), NOT_FOUND, "not found: session", Some("not_found"));
        assert_eq!(resp["id"], 7);
        assert_eq!(resp["error"]["code"], NOT_FOUND);
        assert_eq!(resp["error"]["data"]["kind"], "not_found");
    }
}
