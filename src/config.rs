use std::{env, fmt, net::SocketAddr, str::FromStr};

use thiserror::Error;

pub const DEFAULT_TRANSPORT: &str = "streamable-http";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_APP_NAME: &str = "Calendar MCP Server";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://calendar_mcp.db";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/oauth2callback";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    StreamableHttp,
    Stdio,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable-http",
            Self::Stdio => "stdio",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "streamable-http" => Ok(Self::StreamableHttp),
            "stdio" => Ok(Self::Stdio),
            _ => Err(ConfigError::InvalidTransport(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCalendarSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_uri: String,
    pub auth_uri: String,
    pub scopes: Vec<String>,
    pub api_base_url: String,
}

impl Default for GoogleCalendarSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            scopes: vec![DEFAULT_CALENDAR_SCOPE.to_string()],
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// Process configuration, resolved once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub port: u16,
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub app_name: String,
    pub debug: bool,
    pub database: DatabaseSettings,
    pub google_calendar: GoogleCalendarSettings,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: streamable-http, stdio (got {0:?})")]
    InvalidTransport(String),
    #[error("PORT must be a valid u16")]
    InvalidPort,
    #[error("DEBUG must be a boolean")]
    InvalidDebugFlag,
    #[error("GOOGLE_CALENDAR__SCOPES must name at least one scope")]
    EmptyScopes,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let transport = non_empty("MCP_TRANSPORT")
            .as_deref()
            .unwrap_or(DEFAULT_TRANSPORT)
            .parse::<Transport>()?;
        let port = non_empty("PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let api_token = non_empty("MCP_API_TOKEN");
        let app_name = non_empty("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        let debug = non_empty("DEBUG")
            .map(|value| parse_bool(&value).ok_or(ConfigError::InvalidDebugFlag))
            .transpose()?
            .unwrap_or(false);

        let database = DatabaseSettings {
            url: non_empty("DATABASE__URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        };

        let defaults = GoogleCalendarSettings::default();
        let scopes = match non_empty("GOOGLE_CALENDAR__SCOPES") {
            Some(raw) => {
                let scopes = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|scope| !scope.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                if scopes.is_empty() {
                    return Err(ConfigError::EmptyScopes);
                }
                scopes
            }
            None => defaults.scopes,
        };
        let google_calendar = GoogleCalendarSettings {
            client_id: non_empty("GOOGLE_CALENDAR__CLIENT_ID").unwrap_or_default(),
            client_secret: non_empty("GOOGLE_CALENDAR__CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: non_empty("GOOGLE_CALENDAR__REDIRECT_URI")
                .unwrap_or(defaults.redirect_uri),
            token_uri: non_empty("GOOGLE_CALENDAR__TOKEN_URI").unwrap_or(defaults.token_uri),
            auth_uri: non_empty("GOOGLE_CALENDAR__AUTH_URI").unwrap_or(defaults.auth_uri),
            scopes,
            api_base_url: non_empty("GOOGLE_CALENDAR__API_BASE_URL")
                .unwrap_or(defaults.api_base_url),
        };

        let config = Self {
            transport,
            port,
            bind_addr,
            api_token,
            app_name,
            debug,
            database,
            google_calendar,
        };

        if config.transport == Transport::StreamableHttp {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
