//! The central Model Context Protocol engine
//!
//! Provides JSON-RPC decoding (single messages and batches), method routing, and
//! capabilities negotiation (`initialize`). Both transports feed their payloads through
//! [`handle_payload`].

use rust_mcp_sdk::schema::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListResourcesRequest, ListResourcesResult, ListToolsRequest, ListToolsResult,
    PingRequest, ReadResourceRequest, ServerCapabilities, ServerCapabilitiesResources,
    ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::{
    resources::{build_resources_list, handle_resources_read},
    tools::{build_tools_list, handle_tools_call},
};
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    request_id_to_value, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use crate::{errors::AppError, AppState};

/// Newest first; the first entry is offered when a client asks for an unknown version.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_INSTRUCTIONS: &str = "Call get_authorization_url, open the URL, then pass the \
returned code to exchange_auth_code. Calendar tools use the token stored for user_id.";

/// Handles one decoded transport payload: a single message or a batch.
///
/// Returns `None` when nothing must be sent back (notifications only).
pub async fn handle_payload(state: &AppState, payload: Value) -> Option<Value> {
    let Value::Array(batch) = payload else {
        return handle_json_rpc_value(state, payload).await;
    };

    if batch.is_empty() {
        return Some(Value::Array(vec![json_rpc_error(
            None,
            INVALID_REQUEST,
            "Invalid Request",
        )]));
    }

    let mut responses = Vec::new();
    for item in batch {
        if let Some(response) = handle_json_rpc_value(state, item).await {
            responses.push(response);
        }
    }

    if responses.is_empty() {
        None
    } else {
        Some(Value::Array(responses))
    }
}

pub async fn handle_json_rpc_value(state: &AppState, payload: Value) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let request_id = payload.get("id").cloned();
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            if let Err(error_response) = validate_request_shape(&request) {
                return Some(error_response);
            }

            let request_id = request_id_to_value(request.id);
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(
                    Some(request_id),
                    INVALID_REQUEST,
                    "Invalid Request",
                ));
            }

            Some(
                handle_json_rpc_request(
                    state,
                    Some(request_id),
                    request.method,
                    request.params.map(Value::Object),
                )
                .await,
            )
        }
        JsonrpcMessage::Notification(notification) => {
            if notification.method.trim().is_empty() {
                return None;
            }

            info!(method = %notification.method, "mcp notification received");
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
        }
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let request_id = Some(request_id_to_value(request.id.clone()));
    let Ok(payload) = serde_json::to_value(request) else {
        return Err(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"));
    };

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"))
    }
}

pub async fn handle_json_rpc_request(
    state: &AppState,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
) -> Value {
    let audit_params = redact_audit_params(params.as_ref());

    let response = match method.as_str() {
        "initialize" => {
            let protocol_version = match negotiate_protocol_version(params.as_ref()) {
                Ok(version) => version,
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            let initialize_result = InitializeResult {
                server_info: Implementation {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some(state.app_name.to_string()),
                    description: None,
                    icons: vec![],
                    website_url: None,
                },
                capabilities: ServerCapabilities {
                    tools: Some(ServerCapabilitiesTools {
                        list_changed: Some(false),
                    }),
                    resources: Some(ServerCapabilitiesResources {
                        subscribe: Some(false),
                        list_changed: Some(false),
                    }),
                    prompts: None,
                    ..Default::default()
                },
                protocol_version: protocol_version.to_string(),
                instructions: Some(SERVER_INSTRUCTIONS.to_string()),
                meta: None,
            };

            json_rpc_result(
                id,
                serde_json::to_value(initialize_result).expect("initialize result serialization"),
            )
        }
        "ping" => json_rpc_result(id, json!({})),
        "tools/list" => json_rpc_result(
            id,
            serde_json::to_value(ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: build_tools_list(),
            })
            .expect("tools list result serialization"),
        ),
        "tools/call" => handle_tools_call(state, id, params).await,
        "resources/list" => json_rpc_result(
            id,
            serde_json::to_value(ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources: build_resources_list(),
            })
            .expect("resources list result serialization"),
        ),
        "resources/read" => handle_resources_read(state, id, params).await,
        _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
    };

    info!(
        method = %method,
        params = %audit_params,
        outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
        "mcp action audited"
    );

    response
}

/// Echoes a supported client version, otherwise answers with the newest supported one.
pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<&'static str, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    Ok(SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|version| *version == offered_version)
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]))
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "code"
            | "auth_code"
            | "authorization_code"
            | "authorization"
            | "bearer"
            | "password"
            | "credentials"
            | "credential"
            | "api_key"
            | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}

#[cfg(test)]
mod tests {
    use super::{negotiate_protocol_version, redact_audit_params, SUPPORTED_PROTOCOL_VERSIONS};
    use serde_json::json;

    #[test]
    fn redacts_sensitive_fields_in_audit_params() {
        let params = json!({
            "name": "exchange_auth_code",
            "arguments": {
                "user_id": "alice",
                "code": "4/0AQlEd8x",
                "refresh_token": "should-not-appear",
                "nested": {
                    "client_secret": "should-not-appear"
                }
            }
        });

        let redacted = redact_audit_params(Some(&params));

        assert_eq!(redacted["name"], json!("exchange_auth_code"));
        assert_eq!(redacted["arguments"]["user_id"], json!("alice"));
        assert_eq!(redacted["arguments"]["code"], json!("[REDACTED]"));
        assert_eq!(redacted["arguments"]["refresh_token"], json!("[REDACTED]"));
        assert_eq!(
            redacted["arguments"]["nested"]["client_secret"],
            json!("[REDACTED]")
        );
    }

    #[test]
    fn calendar_ids_are_not_redacted() {
        let params = json!({ "arguments": { "calendar_id": "primary" } });
        let redacted = redact_audit_params(Some(&params));
        assert_eq!(redacted["arguments"]["calendar_id"], json!("primary"));
    }

    #[test]
    fn negotiate_protocol_version_echoes_supported_versions() {
        for offered in SUPPORTED_PROTOCOL_VERSIONS {
            let params = json!({ "protocolVersion": offered });
            let version = negotiate_protocol_version(Some(&params)).expect("supported version");
            assert_eq!(version, offered);
        }
    }

    #[test]
    fn negotiate_protocol_version_offers_newest_for_unknown_version() {
        let params = json!({ "protocolVersion": "2030-01-01" });

        let version = negotiate_protocol_version(Some(&params)).expect("fallback version");
        assert_eq!(version, "2025-06-18");
    }

    #[test]
    fn negotiate_protocol_version_requires_a_version() {
        let error = negotiate_protocol_version(Some(&json!({}))).expect_err("missing version");
        assert!(error.to_string().contains("bad request"));
    }
}
