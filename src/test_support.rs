use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    config::Config,
    errors::AppError,
    google::{
        calendar::CalendarProvider,
        oauth::{OAuthProvider, RefreshOutcome, TokenGrant},
    },
    token_store::{NewToken, SqliteTokenStore, TokenStore, DEFAULT_TOKEN_TYPE},
    AppState,
};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

pub struct MockOAuth {
    pub refresh_outcome: RefreshOutcome,
}

#[async_trait]
impl OAuthProvider for MockOAuth {
    fn authorization_url(&self, user_id: &str) -> Result<String, AppError> {
        Ok(format!("https://accounts.example/auth?state={user_id}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        if code == "bad" {
            return Err(AppError::upstream(400, "<HttpError 400: invalid_grant>"));
        }

        Ok(TokenGrant {
            access_token: format!("access-{code}"),
            refresh_token: Some("refresh-1".to_string()),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            expires_in: 3600,
            scopes: vec![CALENDAR_SCOPE.to_string()],
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshOutcome, AppError> {
        Ok(self.refresh_outcome.clone())
    }
}

/// Records every call as `operation:access_token[:calendar_id][:body]`.
#[derive(Default)]
pub struct MockCalendar {
    pub calls: Mutex<Vec<String>>,
}

impl MockCalendar {
    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    async fn list_calendars(&self, access_token: &str) -> Result<Vec<Value>, AppError> {
        self.record(format!("list:{access_token}"));
        Ok(vec![
            json!({ "id": "primary", "summary": "Alice" }),
            json!({ "id": "team", "summary": "Team" }),
        ])
    }

    async fn get_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<Value, AppError> {
        self.record(format!("get:{access_token}:{calendar_id}"));
        if calendar_id == "missing" {
            return Err(AppError::upstream(404, "<HttpError 404: Not Found>"));
        }

        Ok(json!({
            "id": calendar_id,
            "etag": "\"1\"",
            "summary": "Old",
            "description": "Keep",
            "timeZone": "UTC"
        }))
    }

    async fn insert_calendar(&self, access_token: &str, body: &Value) -> Result<Value, AppError> {
        self.record(format!("insert:{access_token}:{body}"));
        let mut created = body.clone();
        created["id"] = json!("new-cal");
        Ok(created)
    }

    async fn replace_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &Value,
    ) -> Result<Value, AppError> {
        self.record(format!("replace:{access_token}:{calendar_id}:{body}"));
        Ok(body.clone())
    }

    async fn delete_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<(), AppError> {
        self.record(format!("delete:{access_token}:{calendar_id}"));
        Ok(())
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<SqliteTokenStore>,
    pub calendar: Arc<MockCalendar>,
}

impl TestHarness {
    pub async fn new(api_token: Option<&str>, refresh_outcome: RefreshOutcome) -> Self {
        let mut config = Config::from_lookup(|_| None).expect("default config");
        config.api_token = api_token.map(str::to_string);

        let store = Arc::new(SqliteTokenStore::in_memory().await.expect("token store"));
        let calendar = Arc::new(MockCalendar::default());
        let state = AppState::new(
            &config,
            store.clone(),
            Arc::new(MockOAuth { refresh_outcome }),
            calendar.clone(),
        );

        Self {
            state,
            store,
            calendar,
        }
    }

    pub async fn open() -> Self {
        Self::new(None, RefreshOutcome::Revoked).await
    }

    pub async fn store_token(&self, user_id: &str, expires_in: i64, refresh: bool) {
        self.store
            .save_token(NewToken {
                user_id: user_id.to_string(),
                access_token: format!("stored-{user_id}"),
                refresh_token: refresh.then(|| "refresh-1".to_string()),
                token_type: DEFAULT_TOKEN_TYPE.to_string(),
                expires_in,
                scopes: vec![CALENDAR_SCOPE.to_string()],
            })
            .await
            .expect("store token");
    }
}
