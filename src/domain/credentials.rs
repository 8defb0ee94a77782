//! OAuth token lifecycle: completing authorization and resolving usable access tokens

use tracing::{info, warn};

use crate::{
    errors::AppError,
    google::oauth::RefreshOutcome,
    token_store::{NewToken, Token},
    AppState,
};

/// Exchanges an authorization code and stores the resulting token as the user's active one.
pub async fn complete_authorization(
    state: &AppState,
    code: &str,
    user_id: &str,
) -> Result<Token, AppError> {
    let grant = state.oauth.exchange_code(code).await?;

    let token = state
        .token_store
        .save_token(NewToken {
            user_id: user_id.to_string(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_type: grant.token_type,
            expires_in: grant.expires_in,
            scopes: grant.scopes,
        })
        .await?;

    info!(user_id = %user_id, expires_at = %token.expires_at, "authorization stored");
    Ok(token)
}

/// Returns a non-expired access token for the user, refreshing it when possible.
pub async fn resolve_access_token(state: &AppState, user_id: &str) -> Result<String, AppError> {
    let Some(token) = state.token_store.get_token(user_id).await? else {
        return Err(AppError::authorization_required(format!(
            "No token found for user {user_id}. Please authorize first."
        )));
    };

    if !token.is_expired() {
        return Ok(token.access_token);
    }

    let expired = || {
        AppError::authorization_required(format!(
            "Token for user {user_id} is expired. Please authorize again."
        ))
    };

    let Some(refresh_token) = token.refresh_token.as_deref() else {
        return Err(expired());
    };

    match state.oauth.refresh(refresh_token).await? {
        RefreshOutcome::Refreshed(grant) => {
            let refreshed = state
                .token_store
                .update_token(token.id, &grant.access_token, grant.expires_in)
                .await?;
            info!(user_id = %user_id, expires_at = %refreshed.expires_at, "access token refreshed");
            Ok(refreshed.access_token)
        }
        RefreshOutcome::Revoked => {
            warn!(user_id = %user_id, "refresh token rejected, deactivating stored token");
            state.token_store.deactivate_token(token.id).await?;
            Err(expired())
        }
    }
}
