//! Interactive tools exposed via Model Context Protocol
//!
//! Authorization tools drive the Google OAuth flow; calendar tools resolve the caller's
//! stored token and delegate to the `CalendarProvider`.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, Tool},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::{
    credentials::{complete_authorization, resolve_access_token},
    utils::{normalize_user_id, require_text, CalendarChanges},
};
use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_result, tool_error_to_json_rpc,
    tool_success_result, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::{errors::AppError, AppState};

#[macros::mcp_tool(
    name = "get_authorization_url",
    description = "Get the authorization URL for the Google OAuth flow"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetAuthorizationUrlTool {
    /// User identifier the resulting token is stored under (default: "default").
    pub user_id: Option<String>,
}

#[macros::mcp_tool(
    name = "exchange_auth_code",
    description = "Exchange a Google OAuth authorization code for an access token and store it"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ExchangeAuthCodeTool {
    /// The authorization code from Google OAuth.
    pub code: String,
    /// User identifier for token storage (default: "default").
    pub user_id: Option<String>,
}

#[macros::mcp_tool(
    name = "list_calendars",
    description = "List all calendars for the authenticated user"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListCalendarsTool {
    /// User identifier for token retrieval (default: "default").
    pub user_id: Option<String>,
}

#[macros::mcp_tool(name = "get_calendar", description = "Get a calendar by its ID")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetCalendarTool {
    /// ID of the calendar to retrieve.
    pub calendar_id: String,
    /// User identifier for token retrieval (default: "default").
    pub user_id: Option<String>,
}

#[macros::mcp_tool(name = "create_calendar", description = "Create a new calendar")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CreateCalendarTool {
    /// Title of the calendar.
    pub summary: String,
    /// Description of the calendar.
    pub description: Option<String>,
    /// Timezone of the calendar, e.g. "Europe/Berlin".
    pub timezone: Option<String>,
    /// User identifier for token retrieval (default: "default").
    pub user_id: Option<String>,
}

#[macros::mcp_tool(name = "update_calendar", description = "Update an existing calendar")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateCalendarTool {
    /// ID of the calendar to update.
    pub calendar_id: String,
    /// New title for the calendar.
    pub summary: Option<String>,
    /// New description for the calendar.
    pub description: Option<String>,
    /// New timezone for the calendar.
    pub timezone: Option<String>,
    /// User identifier for token retrieval (default: "default").
    pub user_id: Option<String>,
}

#[macros::mcp_tool(name = "delete_calendar", description = "Delete a calendar")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DeleteCalendarTool {
    /// ID of the calendar to delete.
    pub calendar_id: String,
    /// User identifier for token retrieval (default: "default").
    pub user_id: Option<String>,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        GetAuthorizationUrlTool::tool(),
        ExchangeAuthCodeTool::tool(),
        ListCalendarsTool::tool(),
        GetCalendarTool::tool(),
        CreateCalendarTool::tool(),
        UpdateCalendarTool::tool(),
        DeleteCalendarTool::tool(),
    ]
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let arguments = Value::Object(tool_call.arguments.unwrap_or_default());
    let outcome = match tool_call.name.as_str() {
        "get_authorization_url" => get_authorization_url(state, arguments),
        "exchange_auth_code" => exchange_auth_code(state, arguments).await,
        "list_calendars" => list_calendars(state, arguments).await,
        "get_calendar" => get_calendar(state, arguments).await,
        "create_calendar" => create_calendar(state, arguments).await,
        "update_calendar" => update_calendar(state, arguments).await,
        "delete_calendar" => delete_calendar(state, arguments).await,
        _ => {
            return json_rpc_error_with_data(
                id,
                METHOD_NOT_FOUND,
                "Method not found",
                Some(json!({
                    "code": "tool_not_found",
                    "message": "unknown tool name",
                    "details": {
                        "name": tool_call.name,
                    },
                })),
            )
        }
    };

    match outcome {
        Ok(result) => json_rpc_result(id, result),
        Err(err) => tool_error_to_json_rpc(id, err),
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, AppError> {
    serde_json::from_value(arguments)
        .map_err(|err| AppError::bad_request("invalid_arguments", err.to_string()))
}

fn structured_calendar(calendar: Value) -> Map<String, Value> {
    match calendar {
        Value::Object(fields) => fields,
        other => Map::from_iter([("calendar".to_string(), other)]),
    }
}

fn calendar_id_of(calendar: &Value, fallback: &str) -> String {
    calendar
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

fn get_authorization_url(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetAuthorizationUrlTool = parse_arguments(arguments)?;
    let user_id = normalize_user_id(args.user_id)?;
    let auth_url = state.oauth.authorization_url(&user_id)?;

    Ok(tool_success_result(
        format!("Please visit this URL to authorize the application: {auth_url}"),
        Map::from_iter([
            ("auth_url".to_string(), json!(auth_url)),
            (
                "message".to_string(),
                json!("Please visit this URL to authorize the application."),
            ),
        ]),
    ))
}

async fn exchange_auth_code(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: ExchangeAuthCodeTool = parse_arguments(arguments)?;
    let code = require_text("code", &args.code)?;
    let user_id = normalize_user_id(args.user_id)?;

    let structured = match complete_authorization(state, &code, &user_id).await {
        Ok(token) => {
            let expires_in = (token.expires_at - chrono::Utc::now()).num_seconds().max(0);
            Map::from_iter([
                ("success".to_string(), json!(true)),
                (
                    "message".to_string(),
                    json!("Authorization successful. Token stored."),
                ),
                ("expires_in".to_string(), json!(expires_in)),
                ("user_id".to_string(), json!(user_id)),
            ])
        }
        Err(err) => {
            debug!(user_id = %user_id, error = %err, "authorization code exchange failed");
            Map::from_iter([
                ("success".to_string(), json!(false)),
                (
                    "message".to_string(),
                    json!(format!("Authorization failed: {err}")),
                ),
            ])
        }
    };

    let summary = structured["message"].as_str().unwrap_or_default().to_string();
    Ok(tool_success_result(summary, structured))
}

async fn list_calendars(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: ListCalendarsTool = parse_arguments(arguments)?;
    let user_id = normalize_user_id(args.user_id)?;
    let access_token = resolve_access_token(state, &user_id).await?;

    let calendars = state
        .calendar
        .list_calendars(&access_token)
        .await
        .map_err(|err| err.context("Error fetching calendars"))?;
    let total = calendars.len();

    Ok(tool_success_result(
        format!("Returned {total} calendars"),
        Map::from_iter([
            ("calendars".to_string(), Value::Array(calendars)),
            ("total".to_string(), json!(total)),
        ]),
    ))
}

async fn get_calendar(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetCalendarTool = parse_arguments(arguments)?;
    let calendar_id = require_text("calendar_id", &args.calendar_id)?;
    let user_id = normalize_user_id(args.user_id)?;
    let access_token = resolve_access_token(state, &user_id).await?;

    let calendar = state
        .calendar
        .get_calendar(&access_token, &calendar_id)
        .await
        .map_err(|err| err.context(format!("Error fetching calendar {calendar_id}")))?;

    Ok(tool_success_result(
        format!("Calendar {}", calendar_id_of(&calendar, &calendar_id)),
        structured_calendar(calendar),
    ))
}

async fn create_calendar(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: CreateCalendarTool = parse_arguments(arguments)?;
    let summary = require_text("summary", &args.summary)?;
    let user_id = normalize_user_id(args.user_id)?;
    let changes = CalendarChanges::new(Some(summary), args.description, args.timezone);
    let access_token = resolve_access_token(state, &user_id).await?;

    let calendar = state
        .calendar
        .insert_calendar(&access_token, &changes.insert_body())
        .await
        .map_err(|err| err.context("Error creating calendar"))?;

    Ok(tool_success_result(
        format!("Created calendar {}", calendar_id_of(&calendar, "")),
        structured_calendar(calendar),
    ))
}

async fn update_calendar(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: UpdateCalendarTool = parse_arguments(arguments)?;
    let calendar_id = require_text("calendar_id", &args.calendar_id)?;
    let user_id = normalize_user_id(args.user_id)?;
    let changes = CalendarChanges::new(args.summary, args.description, args.timezone);
    let access_token = resolve_access_token(state, &user_id).await?;

    let mut calendar = state
        .calendar
        .get_calendar(&access_token, &calendar_id)
        .await
        .map_err(|err| err.context(format!("Error fetching calendar {calendar_id}")))?;

    changes.apply_to(&mut calendar);
    calendar = state
        .calendar
        .replace_calendar(&access_token, &calendar_id, &calendar)
        .await
        .map_err(|err| err.context(format!("Error updating calendar {calendar_id}")))?;

    Ok(tool_success_result(
        format!("Updated calendar {}", calendar_id_of(&calendar, &calendar_id)),
        structured_calendar(calendar),
    ))
}

async fn delete_calendar(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: DeleteCalendarTool = parse_arguments(arguments)?;
    let calendar_id = require_text("calendar_id", &args.calendar_id)?;
    let user_id = normalize_user_id(args.user_id)?;
    let access_token = resolve_access_token(state, &user_id).await?;

    state
        .calendar
        .delete_calendar(&access_token, &calendar_id)
        .await
        .map_err(|err| err.context(format!("Error deleting calendar {calendar_id}")))?;

    let message = format!("Calendar {calendar_id} deleted successfully.");
    Ok(tool_success_result(
        message.clone(),
        Map::from_iter([
            ("success".to_string(), json!(true)),
            ("message".to_string(), json!(message)),
        ]),
    ))
}

#[cfg(test)]
mod tests {
    use super::build_tools_list;

    #[test]
    fn tools_list_names_every_tool_once() {
        let names = build_tools_list()
            .into_iter()
            .map(|tool| tool.name)
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            vec![
                "get_authorization_url",
                "exchange_auth_code",
                "list_calendars",
                "get_calendar",
                "create_calendar",
                "update_calendar",
                "delete_calendar",
            ]
        );
    }

    #[test]
    fn calendar_tools_require_calendar_id_in_schema() {
        let tool = build_tools_list()
            .into_iter()
            .find(|tool| tool.name == "delete_calendar")
            .expect("delete_calendar tool");

        let tool = serde_json::to_value(tool).expect("tool serialization");
        let required = tool["inputSchema"]["required"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert!(required.contains(&serde_json::json!("calendar_id")));
        assert!(!required.contains(&serde_json::json!("user_id")));
    }
}
