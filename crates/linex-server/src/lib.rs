//! # linex HTTP Service
//!
//! Hosts a [`LineBot`] behind an HTTP endpoint:
//!
//! - `POST <webhook_path>`: LINE webhook intake (signature checked)
//! - `GET /` and `GET /health`: liveness and readiness report
//!
//! The dispatcher is marked ready only after the listener is bound, so
//! webhooks arriving during startup receive 503 and are redelivered by LINE.

pub mod config;

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use linex_sdk::client::LineClient;
use linex_sdk::dispatch::{ready_fn, ReadyHook};
use linex_sdk::{BoxError, LineBot, WebhookReceiver, WebhookRequest, WebhookResponse};
use serde::Serialize;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

pub use config::{LoggingConfig, ServerConfig, ServiceConfig};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The hosted bot
    pub bot: Arc<LineBot>,

    /// Webhook intake feeding the bot's dispatcher
    pub receiver: Arc<WebhookReceiver>,
}

impl AppState {
    /// Create application state for `bot`.
    pub fn new(bot: Arc<LineBot>) -> Self {
        let receiver = Arc::new(bot.receiver());
        Self { bot, receiver }
    }
}

// ============================================================================
// Response Bodies
// ============================================================================

/// Body of every webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<usize>,
}

/// Body of the liveness endpoints.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ready: bool,
    pub version: String,
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create the HTTP router.
pub fn create_router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route("/", get(handle_health_check))
        .route("/health", get(handle_health_check))
        .route(webhook_path, post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, mark the bot ready, and serve until SIGINT or SIGTERM.
///
/// # Errors
///
/// `ServiceError::BindFailed` if the address cannot be bound,
/// `ServiceError::ServerFailed` if serving stops with an error.
pub async fn start_server(config: &ServerConfig, bot: Arc<LineBot>) -> Result<(), ServiceError> {
    let app = create_router(AppState::new(bot.clone()), &config.webhook_path);

    let address = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = address.parse().map_err(|_| ServiceError::BindFailed {
        address: address.clone(),
        message: "not a valid socket address".to_string(),
    })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!(
        address = %addr,
        webhook_path = %config.webhook_path,
        "Starting HTTP server"
    );

    tokio::spawn(async move {
        bot.mark_ready().await;
        info!("Bot is ready to receive events");
    });

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_seconds);
    serve_with_shutdown(
        listener,
        app,
        shutdown_signal(shutdown_timeout),
        shutdown_timeout,
    )
    .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Serve `app` until `shutdown` resolves, then drain in-flight requests.
///
/// Connections still open `drain_timeout` after the signal are dropped.
///
/// # Errors
///
/// `ServiceError::ServerFailed` if serving stops with an error.
pub async fn serve_with_shutdown<S>(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: S,
    drain_timeout: Duration,
) -> Result<(), ServiceError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (signalled, on_signal) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        let _ = signalled.send(());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async move {
        match on_signal.await {
            Ok(()) => tokio::time::sleep(drain_timeout).await,
            // The server stopped without a signal; let its result win.
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = &mut server => result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        }),
        _ = drain_deadline => {
            warn!(
                timeout_secs = drain_timeout.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

/// A ready hook that fetches and logs the bot account's identity.
///
/// A failure is logged by the dispatcher and does not block readiness.
pub fn bot_info_hook(client: Arc<LineClient>) -> Arc<dyn ReadyHook> {
    ready_fn(move || {
        let client = client.clone();
        async move {
            let bot = client.get_bot_info().await?;
            info!(
                bot_user_id = %bot.user_id,
                basic_id = %bot.basic_id,
                display_name = %bot.display_name,
                "Connected to LINE"
            );
            Ok::<(), BoxError>(())
        }
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle LINE webhook requests.
#[instrument(skip(state, headers, body), fields(body_length = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_lowercase(), value.to_string()))
        })
        .collect();

    let response = state
        .receiver
        .receive_webhook(WebhookRequest::new(header_map, body))
        .await;

    webhook_response(response)
}

fn webhook_response(response: WebhookResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let reply = WebhookReply {
        message: response.message().to_string(),
        events: response.is_success().then(|| response.events()),
    };
    (status, Json(reply)).into_response()
}

/// Report liveness; always 200 while the process serves requests.
#[instrument(skip(state))]
pub async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ready: state.bot.dispatcher().is_ready(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] linex_sdk::ConfigError),

    #[error("Locale load failed: {0}")]
    Locale(#[from] linex_sdk::LocaleError),
}

impl ServiceError {
    /// Process exit code for a startup failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
            Self::Locale(_) => 4,
        }
    }
}

impl From<linex_sdk::ApiError> for ServiceError {
    /// Only client construction can fail at startup, so this is a
    /// configuration problem.
    fn from(error: linex_sdk::ApiError) -> Self {
        Self::Configuration(linex_sdk::ConfigError::Invalid {
            name: "bot.api".to_string(),
            message: error.to_string(),
        })
    }
}

impl From<linex_sdk::BotError> for ServiceError {
    fn from(error: linex_sdk::BotError) -> Self {
        match error {
            linex_sdk::BotError::Config(e) => Self::Configuration(e),
            linex_sdk::BotError::Locale(e) => Self::Locale(e),
            linex_sdk::BotError::Api(e) => e.into(),
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
