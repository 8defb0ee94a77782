//! Persistent OAuth tokens, one active token per user

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Pool, Sqlite,
};

use crate::errors::AppError;

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
pub const MAX_USER_ID_LEN: usize = 255;

const CREATE_TOKENS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id VARCHAR(255) NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    token_type VARCHAR(50) NOT NULL DEFAULT 'Bearer',
    expires_at TEXT NOT NULL,
    scopes TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const CREATE_USER_ID_INDEX: &str = "CREATE INDEX IF NOT EXISTS ix_tokens_user_id ON tokens (user_id)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: i64,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scopes: Vec<String>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Newest active token for the user, if any.
    async fn get_token(&self, user_id: &str) -> Result<Option<Token>, AppError>;

    /// Stores a new active token and deactivates every earlier one for the same user.
    async fn save_token(&self, token: NewToken) -> Result<Token, AppError>;

    async fn update_token(
        &self,
        id: i64,
        access_token: &str,
        expires_in: i64,
    ) -> Result<Token, AppError>;

    async fn deactivate_token(&self, id: i64) -> Result<(), AppError>;
}

#[derive(Debug, FromRow)]
struct TokenRow {
    id: i64,
    user_id: String,
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_at: DateTime<Utc>,
    scopes: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for Token {
    type Error = AppError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let scopes = serde_json::from_str::<Vec<String>>(&row.scopes).map_err(|err| {
            AppError::internal(format!("stored scopes for token {} are invalid: {err}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            token_type: row.token_type,
            expires_at: row.expires_at,
            scopes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pool: Pool<Sqlite>,
}

impl SqliteTokenStore {
    /// Opens (creating if missing) the database and ensures the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = if database_url.contains(":memory:") {
            // Each in-memory connection is its own database; keep exactly one alive.
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(30))
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_TOKENS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_USER_ID_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Token, AppError> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AppError::internal(format!("token {id} not found")))?;

        row.try_into()
    }
}

/// `expires_in` comes from the token endpoint and is not trusted to fit a timestamp.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AppError> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::upstream(
                502,
                format!("token endpoint returned an unusable expires_in: {expires_in}"),
            )
        })
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn get_token(&self, user_id: &str) -> Result<Option<Token>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT * FROM tokens WHERE user_id = ? AND is_active = 1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Token::try_from).transpose()
    }

    async fn save_token(&self, token: NewToken) -> Result<Token, AppError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, token.expires_in)?;
        let scopes = serde_json::to_string(&token.scopes)
            .map_err(|err| AppError::internal(format!("failed to encode scopes: {err}")))?;

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            "UPDATE tokens SET is_active = 0, updated_at = ? WHERE user_id = ? AND is_active = 1",
        )
        .bind(now)
        .bind(&token.user_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        let id = sqlx::query(
            "INSERT INTO tokens \
             (user_id, access_token, refresh_token, token_type, expires_at, scopes, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&token.user_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.token_type)
        .bind(expires_at)
        .bind(&scopes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .last_insert_rowid();

        tx.commit().await.map_err(storage_error)?;

        self.fetch_by_id(id).await
    }

    async fn update_token(
        &self,
        id: i64,
        access_token: &str,
        expires_in: i64,
    ) -> Result<Token, AppError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, expires_in)?;

        sqlx::query(
            "UPDATE tokens SET access_token = ?, expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(access_token)
        .bind(expires_at)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        self.fetch_by_id(id).await
    }

    async fn deactivate_token(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE tokens SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error(err: sqlx::Error) -> AppError {
    AppError::internal(format!("token storage failed: {err}"))
}
