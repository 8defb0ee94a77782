//! Google OAuth and Calendar v3 REST clients
//!
//! Both clients sit behind traits so the MCP layer can be exercised without network access.

pub mod calendar;
pub mod oauth;

use serde_json::Value;

use crate::errors::AppError;

/// Extracts the most useful message from a Google error body.
///
/// The Calendar API nests errors (`{"error":{"message":..}}`) while the OAuth token
/// endpoint returns flat ones (`{"error":"invalid_grant","error_description":..}`).
pub fn google_error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().and_then(|value| value.get("error"));

    let message = match error {
        Some(Value::Object(details)) => details
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(Value::String(code)) => {
            let description = parsed
                .as_ref()
                .and_then(|value| value.get("error_description"))
                .and_then(Value::as_str);
            Some(match description {
                Some(description) => format!("{code}: {description}"),
                None => code.clone(),
            })
        }
        _ => None,
    };

    match message {
        Some(message) => format!("<HttpError {status}: {message}>"),
        None if body.trim().is_empty() => format!("<HttpError {status}>"),
        None => format!("<HttpError {status}: {}>", body.trim()),
    }
}

/// The `error` code of a flat OAuth error body, e.g. `invalid_grant`.
pub fn oauth_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

pub(crate) fn transport_error(err: reqwest::Error) -> AppError {
    AppError::upstream(502, format!("request to Google failed: {err}"))
}

pub(crate) async fn error_from_response(response: reqwest::Response) -> AppError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AppError::upstream(status, google_error_message(status, &body))
}

#[cfg(test)]
mod tests {
    use super::{google_error_message, oauth_error_code};

    #[test]
    fn nested_calendar_error_message_is_used() {
        let body = r#"{"error":{"code":404,"message":"Not Found","errors":[]}}"#;
        assert_eq!(google_error_message(404, body), "<HttpError 404: Not Found>");
    }

    #[test]
    fn flat_oauth_error_includes_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        assert_eq!(
            google_error_message(400, body),
            "<HttpError 400: invalid_grant: Bad Request>"
        );
    }

    #[test]
    fn non_json_body_is_passed_through() {
        assert_eq!(google_error_message(503, " busy "), "<HttpError 503: busy>");
        assert_eq!(google_error_message(500, ""), "<HttpError 500>");
    }

    #[test]
    fn oauth_error_code_reads_only_flat_error_field() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        assert_eq!(oauth_error_code(body).as_deref(), Some("invalid_grant"));

        let nested = r#"{"error":{"code":400,"message":"invalid_grant"}}"#;
        assert_eq!(oauth_error_code(nested), None);
        assert_eq!(oauth_error_code("invalid_grant"), None);
    }
}
