//! Process bootstrap: configured -> running -> exited
//!
//! Startup failures surface as `LaunchError`, which `main` turns into a nonzero exit code.
//! A shutdown signal ends the running transport cleanly.

use std::{fmt, future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{io::AsyncWrite, net::TcpListener, sync::mpsc};
use tracing::{error, info, warn};

use crate::{
    build_app,
    config::{Config, ConfigError, Transport},
    errors::AppError,
    google::{calendar::GoogleCalendarClient, oauth::GoogleOAuthClient},
    mcp::stdio,
    token_store::SqliteTokenStore,
    AppState,
};

const GOOGLE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Configured,
    Running,
    Exited,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Exited => "exited",
        })
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open token database: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to configure Google client: {0}")]
    Google(AppError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("transport failed: {0}")]
    Serve(#[source] io::Error),
}

pub async fn build_state(config: &Config) -> Result<AppState, LaunchError> {
    let token_store = SqliteTokenStore::connect(&config.database.url).await?;

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(GOOGLE_REQUEST_TIMEOUT)
        .build()?;
    let calendar = GoogleCalendarClient::new(http.clone(), &config.google_calendar.api_base_url)
        .map_err(LaunchError::Google)?;
    let oauth = GoogleOAuthClient::new(http, config.google_calendar.clone());

    if config.google_calendar.client_id.is_empty() {
        warn!("GOOGLE_CALENDAR__CLIENT_ID is not set, authorization tools will fail");
    }

    Ok(AppState::new(
        config,
        Arc::new(token_store),
        Arc::new(oauth),
        Arc::new(calendar),
    ))
}

pub async fn launch(config: Config) -> Result<(), LaunchError> {
    info!(
        phase = %LaunchPhase::Configured,
        transport = %config.transport,
        port = config.port,
        "launcher phase"
    );

    let result = run(&config).await;

    match &result {
        Ok(()) => info!(phase = %LaunchPhase::Exited, exit_code = 0, "launcher phase"),
        Err(err) => error!(phase = %LaunchPhase::Exited, exit_code = 1, error = %err, "launcher phase"),
    }
    result
}

async fn run(config: &Config) -> Result<(), LaunchError> {
    let state = build_state(config).await?;

    match config.transport {
        Transport::StreamableHttp => {
            let addr = config.bind_socket()?;
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| LaunchError::Bind { addr, source })?;

            info!(
                phase = %LaunchPhase::Running,
                bind_addr = %addr,
                "streamable-http transport listening"
            );
            serve_http(state, listener, shutdown_signal()).await
        }
        Transport::Stdio => {
            info!(phase = %LaunchPhase::Running, "stdio transport ready");
            serve_stdio(
                state,
                stdio::spawn_stdin_reader(),
                tokio::io::stdout(),
                shutdown_signal(),
            )
            .await
        }
    }
}

/// Serves the router on a bound listener until `shutdown` resolves, letting in-flight
/// requests finish.
pub async fn serve_http<F>(
    state: AppState,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), LaunchError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_app(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(LaunchError::Serve)
}

/// Serves stdin lines until input ends or `shutdown` resolves. An open stdin does not
/// hold the process after shutdown since its reader lives on a detached thread.
pub async fn serve_stdio<W, F>(
    state: AppState,
    lines: mpsc::Receiver<io::Result<String>>,
    writer: W,
    shutdown: F,
) -> Result<(), LaunchError>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        result = stdio::serve_lines(&state, lines, writer) => result.map_err(LaunchError::Serve),
        _ = shutdown => Ok(()),
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "shutdown requested"),
        _ = terminate => info!(signal = "SIGTERM", "shutdown requested"),
    }
}
