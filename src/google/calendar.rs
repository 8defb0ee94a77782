use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::errors::AppError;

use super::{error_from_response, transport_error};

/// Calendar v3 operations, authenticated with a user's OAuth access token.
///
/// Calendars are passed through as raw JSON so every field Google returns reaches the client.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<Value>, AppError>;

    async fn get_calendar(&self, access_token: &str, calendar_id: &str)
        -> Result<Value, AppError>;

    async fn insert_calendar(&self, access_token: &str, body: &Value) -> Result<Value, AppError>;

    async fn replace_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &Value,
    ) -> Result<Value, AppError>;

    async fn delete_calendar(&self, access_token: &str, calendar_id: &str)
        -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    base_url: Url,
}

impl GoogleCalendarClient {
    pub fn new(http: Client, base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url).map_err(|err| {
            AppError::internal(format!("invalid GOOGLE_CALENDAR__API_BASE_URL: {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::internal(
                "GOOGLE_CALENDAR__API_BASE_URL cannot be used as a base URL",
            ));
        }

        Ok(Self { http, base_url })
    }

    /// Appends path segments, percent-encoding each one (calendar ids may contain `/` or `#`).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, AppError> {
        let mut request = self.http.request(method, url).bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response)
    }

    async fn send_json(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        self.send(method, url, access_token, body)
            .await?
            .json::<Value>()
            .await
            .map_err(transport_error)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<Value>, AppError> {
        let url = self.endpoint(&["users", "me", "calendarList"]);
        let mut page = self.send_json(Method::GET, url, access_token, None).await?;

        match page.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    async fn get_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<Value, AppError> {
        let url = self.endpoint(&["calendars", calendar_id]);
        self.send_json(Method::GET, url, access_token, None).await
    }

    async fn insert_calendar(&self, access_token: &str, body: &Value) -> Result<Value, AppError> {
        let url = self.endpoint(&["calendars"]);
        self.send_json(Method::POST, url, access_token, Some(body))
            .await
    }

    async fn replace_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &Value,
    ) -> Result<Value, AppError> {
        let url = self.endpoint(&["calendars", calendar_id]);
        self.send_json(Method::PUT, url, access_token, Some(body))
            .await
    }

    async fn delete_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<(), AppError> {
        let url = self.endpoint(&["calendars", calendar_id]);
        self.send(Method::DELETE, url, access_token, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new(Client::new(), &server.uri()).expect("client")
    }

    #[test]
    fn rejects_invalid_base_url() {
        let error = GoogleCalendarClient::new(Client::new(), "not a url").expect_err("invalid");
        assert!(matches!(error, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn list_calendars_returns_items_with_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "calendar#calendarList",
                "items": [
                    { "id": "primary", "summary": "Alice" },
                    { "id": "team@group.calendar.google.com", "summary": "Team" }
                ]
            })))
            .mount(&mock_server)
            .await;

        let calendars = client(&mock_server)
            .list_calendars("ya29.token")
            .await
            .expect("calendars");

        assert_eq!(calendars.len(), 2);
        assert_eq!(calendars[1]["summary"], "Team");
    }

    #[tokio::test]
    async fn list_calendars_without_items_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "kind": "x" })))
            .mount(&mock_server)
            .await;

        let calendars = client(&mock_server)
            .list_calendars("ya29.token")
            .await
            .expect("calendars");
        assert!(calendars.is_empty());
    }

    #[tokio::test]
    async fn calendar_ids_are_encoded_as_one_segment() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/a%2Fb"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "a/b", "summary": "Slash" })),
            )
            .mount(&mock_server)
            .await;

        let calendar = client(&mock_server)
            .get_calendar("ya29.token", "a/b")
            .await
            .expect("calendar");
        assert_eq!(calendar["summary"], "Slash");
    }

    #[tokio::test]
    async fn insert_and_replace_send_json_bodies() {
        let mock_server = MockServer::start().await;
        let body = json!({ "summary": "Trips", "timeZone": "Europe/Berlin" });

        Mock::given(method("POST"))
            .and(path("/calendars"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "c1", "summary": "Trips" })))
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/calendars/c1"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "c1", "summary": "Trips" })))
            .mount(&mock_server)
            .await;

        let calendars = client(&mock_server);
        let created = calendars
            .insert_calendar("ya29.token", &body)
            .await
            .expect("created");
        let replaced = calendars
            .replace_calendar("ya29.token", "c1", &body)
            .await
            .expect("replaced");

        assert_eq!(created["id"], "c1");
        assert_eq!(replaced["summary"], "Trips");
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/calendars/c1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server)
            .delete_calendar("ya29.token", "c1")
            .await
            .expect("deleted");
    }

    #[tokio::test]
    async fn google_errors_become_upstream_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "Not Found" }
            })))
            .mount(&mock_server)
            .await;

        let error = client(&mock_server)
            .get_calendar("ya29.token", "missing")
            .await
            .expect_err("missing calendar");

        assert!(matches!(error, AppError::Upstream { status: 404, .. }));
        assert_eq!(error.to_string(), "<HttpError 404: Not Found>");
    }
}
