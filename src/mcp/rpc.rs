//! JSON-RPC protocol representations and formatting utilities
//!
//! Maps `AppError`s either to JSON-RPC error objects or, for failures a model should
//! see and react to, to tool results flagged with `isError`.

use rust_mcp_sdk::schema::{
    CallToolResult, ContentBlock, JsonrpcErrorResponse, JsonrpcResultResponse, RequestId,
    Result as McpResult, RpcError, TextContent,
};
use serde_json::{json, Map, Value};

use crate::errors::AppError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const AUTHORIZATION_REQUIRED: i32 = -32000;
pub const UNAUTHORIZED: i32 = -32001;
pub const UPSTREAM_ERROR: i32 = -32002;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(json!({
                "code": code,
                "message": message,
                "details": {}
            })),
        ),
        AppError::Unauthorized { code, message } => json_rpc_error_with_data(
            id,
            UNAUTHORIZED,
            "Unauthorized",
            Some(json!({
                "code": code,
                "message": message,
                "details": {}
            })),
        ),
        AppError::AuthorizationRequired { message } => json_rpc_error_with_data(
            id,
            AUTHORIZATION_REQUIRED,
            "Authorization required",
            Some(json!({
                "code": "authorization_required",
                "message": message,
                "details": {}
            })),
        ),
        AppError::Upstream { status, message } => json_rpc_error_with_data(
            id,
            UPSTREAM_ERROR,
            "Upstream error",
            Some(json!({
                "code": "upstream_error",
                "message": message,
                "details": { "status": status }
            })),
        ),
        AppError::Internal { message, .. } => {
            tracing::error!(error = %message, "mcp request failed with internal error");
            json_rpc_error(id, INTERNAL_ERROR, "Internal error")
        }
    }
}

/// Tool failures the caller can act on become `isError` results; the rest stay protocol errors.
pub fn tool_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::AuthorizationRequired { message } | AppError::Upstream { message, .. } => {
            json_rpc_result(id, tool_error_result(message))
        }
        other => app_error_to_json_rpc(id, other),
    }
}

pub fn tool_error_result(message: String) -> Value {
    serde_json::to_value(CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(message, None, None))],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    })
    .expect("tool error result serialization")
}

pub fn tool_success_result(summary: String, structured: Map<String, Value>) -> Value {
    serde_json::to_value(CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(summary, None, None))],
        is_error: None,
        meta: None,
        structured_content: Some(structured),
    })
    .expect("tool result serialization")
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bad_request_maps_to_invalid_params_with_details() {
        let response = app_error_to_json_rpc(
            Some(json!(7)),
            AppError::bad_request("missing_argument", "code must not be empty"),
        );

        assert_eq!(response["id"], json!(7));
        assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));
        assert_eq!(response["error"]["data"]["code"], json!("missing_argument"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = app_error_to_json_rpc(
            Some(json!("a")),
            AppError::internal("database exploded"),
        );

        assert_eq!(response["error"]["code"], json!(INTERNAL_ERROR));
        assert!(!response.to_string().contains("exploded"));
    }

    #[test]
    fn actionable_tool_errors_become_error_results() {
        let response = tool_error_to_json_rpc(
            Some(json!(1)),
            AppError::authorization_required("No token found for user bob. Please authorize first."),
        );

        assert!(!is_json_rpc_error(&response));
        assert_eq!(response["result"]["isError"], json!(true));
        assert_eq!(
            response["result"]["content"][0]["text"],
            json!("No token found for user bob. Please authorize first.")
        );
    }

    #[test]
    fn validation_tool_errors_stay_protocol_errors() {
        let response = tool_error_to_json_rpc(
            Some(json!(1)),
            AppError::bad_request("missing_argument", "summary must not be empty"),
        );

        assert!(is_json_rpc_error(&response));
        assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));
    }
}
