use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod google;
pub mod http;
pub mod launcher;
pub mod logging;
pub mod mcp;
pub mod token_store;

#[cfg(test)]
mod test_support;

use config::Config;
use google::{calendar::CalendarProvider, oauth::OAuthProvider};
use http::handlers::{MCP_ENDPOINT, OAUTH_CALLBACK_ENDPOINT};
use token_store::TokenStore;

#[derive(Clone)]
pub struct AppState {
    pub api_token: Option<Arc<str>>,
    pub app_name: Arc<str>,
    pub token_store: Arc<dyn TokenStore>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
}

impl AppState {
    pub fn new(
        config: &Config,
        token_store: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthProvider>,
        calendar: Arc<dyn CalendarProvider>,
    ) -> Self {
        Self {
            api_token: config.api_token.as_deref().map(Arc::<str>::from),
            app_name: Arc::<str>::from(config.app_name.as_str()),
            token_store,
            oauth,
            calendar,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(MCP_ENDPOINT, post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route(OAUTH_CALLBACK_ENDPOINT, get(http::handlers::oauth_callback))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
