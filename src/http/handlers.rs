//! Axum HTTP handlers for the web server
//!
//! Provides the streamable-http MCP endpoint, the OAuth redirect target, and general
//! metadata endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    credentials::complete_authorization,
    utils::{normalize_user_id, optional_text, require_text},
};
use crate::errors::AppError;
use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::mcp::server::handle_payload;
use crate::AppState;

pub const MCP_ENDPOINT: &str = "/mcp";
pub const OAUTH_CALLBACK_ENDPOINT: &str = "/oauth2callback";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
    pub transport: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OAuthCallbackResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: MCP_ENDPOINT,
        transport: "streamable-http",
    })
}

/// Streamable-http POST: requests are answered inline as JSON, notification-only bodies
/// are acknowledged with `202 Accepted`.
pub async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            )
                .into_response()
        }
    };

    match handle_payload(&state, payload).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Browser redirect target of the consent screen; `state` carries the user id.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Json<OAuthCallbackResponse>, AppError> {
    if let Some(error) = optional_text(params.error) {
        return Err(AppError::bad_request(
            "authorization_denied",
            format!("Authorization failed: {error}"),
        ));
    }

    let code = require_text("code", params.code.as_deref().unwrap_or_default())?;
    let user_id = normalize_user_id(optional_text(params.state))?;

    complete_authorization(&state, &code, &user_id)
        .await
        .map_err(|err| err.context("Authorization failed"))?;

    Ok(Json(OAuthCallbackResponse {
        success: true,
        message: "Authorization successful. Token stored.".to_string(),
        user_id,
    }))
}
