//! Model Context Protocol static resource providers

use rust_mcp_sdk::schema::{
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource,
    TextResourceContents,
};
use serde_json::{json, Value};

use crate::domain::utils::DEFAULT_USER_ID;
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_error_with_data, json_rpc_result,
    INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::AppState;

pub const AUTH_URL_RESOURCE_URI: &str = "auth://url";

pub fn build_resources_list() -> Vec<Resource> {
    vec![Resource {
        annotations: None,
        description: Some("Google OAuth authorization URL for the default user".to_string()),
        icons: vec![],
        meta: None,
        mime_type: Some("text/plain".to_string()),
        name: "Authorization URL".to_string(),
        size: None,
        title: None,
        uri: AUTH_URL_RESOURCE_URI.to_string(),
    }]
}

pub async fn handle_resources_read(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    match resource_read.uri.as_str() {
        AUTH_URL_RESOURCE_URI => match state.oauth.authorization_url(DEFAULT_USER_ID) {
            Ok(auth_url) => {
                let result = serde_json::to_value(ReadResourceResult {
                    contents: vec![ReadResourceContent::from(TextResourceContents {
                        meta: None,
                        mime_type: Some("text/plain".to_string()),
                        text: auth_url,
                        uri: AUTH_URL_RESOURCE_URI.to_string(),
                    })],
                    meta: None,
                })
                .expect("read auth url result serialization");

                json_rpc_result(id, result)
            }
            Err(err) => app_error_to_json_rpc(id, err),
        },
        _ => json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({
                "code": "resource_not_found",
                "message": "unknown resource uri",
                "details": {
                    "uri": resource_read.uri,
                },
            })),
        ),
    }
}
