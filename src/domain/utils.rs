//! Argument normalization and calendar body helpers shared by tools and resources

use serde_json::{Map, Value};

use crate::{errors::AppError, token_store::MAX_USER_ID_LEN};

pub const DEFAULT_USER_ID: &str = "default";

pub fn normalize_user_id(user_id: Option<String>) -> Result<String, AppError> {
    let Some(value) = user_id else {
        return Ok(DEFAULT_USER_ID.to_string());
    };

    let normalized = value.trim();
    if normalized.is_empty() || normalized.chars().count() > MAX_USER_ID_LEN {
        return Err(AppError::bad_request(
            "invalid_user_id",
            "user_id must be between 1 and 255 characters",
        ));
    }

    Ok(normalized.to_string())
}

pub fn require_text(field: &'static str, value: &str) -> Result<String, AppError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(AppError::bad_request(
            "missing_argument",
            format!("{field} must not be empty"),
        ));
    }

    Ok(normalized.to_string())
}

/// Treats blank strings the same as an absent argument.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Calendar fields a caller may set; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarChanges {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub timezone: Option<String>,
}

impl CalendarChanges {
    pub fn new(
        summary: Option<String>,
        description: Option<String>,
        timezone: Option<String>,
    ) -> Self {
        Self {
            summary: optional_text(summary),
            description: optional_text(description),
            timezone: optional_text(timezone),
        }
    }

    pub fn insert_body(&self) -> Value {
        let mut calendar = Value::Object(Map::new());
        self.apply_to(&mut calendar);
        calendar
    }

    /// Overwrites the provided fields on a calendar resource, using Google's field names.
    pub fn apply_to(&self, calendar: &mut Value) {
        let Some(fields) = calendar.as_object_mut() else {
            return;
        };

        if let Some(summary) = &self.summary {
            fields.insert("summary".to_string(), Value::String(summary.clone()));
        }
        if let Some(description) = &self.description {
            fields.insert("description".to_string(), Value::String(description.clone()));
        }
        if let Some(timezone) = &self.timezone {
            fields.insert("timeZone".to_string(), Value::String(timezone.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize_user_id, optional_text, require_text, CalendarChanges, DEFAULT_USER_ID};

    #[test]
    fn user_id_defaults_and_trims() {
        assert_eq!(normalize_user_id(None).expect("default"), DEFAULT_USER_ID);
        assert_eq!(
            normalize_user_id(Some("  alice ".to_string())).expect("trimmed"),
            "alice"
        );
    }

    #[test]
    fn rejects_blank_or_oversized_user_id() {
        let error = normalize_user_id(Some("   ".to_string())).expect_err("blank");
        assert!(error.to_string().contains("bad request"));

        let error = normalize_user_id(Some("x".repeat(256))).expect_err("too long");
        assert!(error.to_string().contains("bad request"));

        assert!(normalize_user_id(Some("x".repeat(255))).is_ok());
    }

    #[test]
    fn require_text_names_the_field() {
        let error = require_text("calendar_id", " ").expect_err("blank");
        assert_eq!(error.to_string(), "bad request: calendar_id must not be empty");
    }

    #[test]
    fn blank_optional_text_is_absent() {
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" x ".to_string())).as_deref(), Some("x"));
    }

    #[test]
    fn insert_body_only_contains_provided_fields() {
        let changes = CalendarChanges::new(Some("Trips".to_string()), None, Some("UTC".to_string()));

        assert_eq!(
            changes.insert_body(),
            json!({ "summary": "Trips", "timeZone": "UTC" })
        );
    }

    #[test]
    fn apply_to_keeps_untouched_fields() {
        let mut calendar = json!({
            "id": "c1",
            "etag": "\"123\"",
            "summary": "Old",
            "description": "Keep me",
            "timeZone": "UTC"
        });

        CalendarChanges::new(Some("New".to_string()), Some(String::new()), None)
            .apply_to(&mut calendar);

        assert_eq!(calendar["summary"], "New");
        assert_eq!(calendar["description"], "Keep me");
        assert_eq!(calendar["timeZone"], "UTC");
        assert_eq!(calendar["etag"], "\"123\"");
    }

    #[test]
    fn blank_changes_leave_calendar_untouched() {
        let changes = CalendarChanges::new(Some(" ".to_string()), Some(String::new()), None);
        assert_eq!(changes.insert_body(), json!({}));
    }
}
