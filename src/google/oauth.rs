use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::{config::GoogleCalendarSettings, errors::AppError, token_store::DEFAULT_TOKEN_TYPE};

use super::{error_from_response, google_error_message, oauth_error_code, transport_error};

pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(TokenGrant),
    /// The refresh token was rejected (`invalid_grant`): expired or revoked.
    Revoked,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent URL; `user_id` travels through the flow as the OAuth `state`.
    fn authorization_url(&self, user_id: &str) -> Result<String, AppError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AppError>;
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    http: Client,
    settings: GoogleCalendarSettings,
}

impl GoogleOAuthClient {
    pub fn new(http: Client, settings: GoogleCalendarSettings) -> Self {
        Self { http, settings }
    }

    fn grant_from(&self, response: TokenEndpointResponse) -> TokenGrant {
        let scopes = response
            .scope
            .map(|scope| {
                scope
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or_else(|| self.settings.scopes.clone());

        TokenGrant {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expires_in: response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            scopes,
        }
    }

    async fn post_token_form(
        &self,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, AppError> {
        self.http
            .post(&self.settings.token_uri)
            .form(form)
            .send()
            .await
            .map_err(transport_error)
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorization_url(&self, user_id: &str) -> Result<String, AppError> {
        if self.settings.client_id.is_empty() {
            return Err(AppError::bad_request(
                "oauth_not_configured",
                "GOOGLE_CALENDAR__CLIENT_ID is not configured",
            ));
        }

        let scope = self.settings.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.settings.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", user_id),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|err| AppError::internal(format!("invalid GOOGLE_CALENDAR__AUTH_URI: {err}")))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let response = self
            .post_token_form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ])
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response
            .json::<TokenEndpointResponse>()
            .await
            .map_err(transport_error)?;
        debug!(has_refresh_token = body.refresh_token.is_some(), "authorization code exchanged");
        Ok(self.grant_from(body))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AppError> {
        let response = self
            .post_token_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
            ])
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            if oauth_error_code(&body).as_deref() == Some("invalid_grant") {
                return Ok(RefreshOutcome::Revoked);
            }
            return Err(AppError::upstream(
                status.as_u16(),
                google_error_message(status.as_u16(), &body),
            ));
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response
            .json::<TokenEndpointResponse>()
            .await
            .map_err(transport_error)?;
        Ok(RefreshOutcome::Refreshed(self.grant_from(body)))
    }
}
