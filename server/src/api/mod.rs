//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, irc::ReadyLatch, secret::WebhookSecret, webhooks};

/// Per-request deadline, covering body upload.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest accepted webhook body. Larger uploads are answered with 400.
pub const MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// HMAC key shared with GitHub
    pub secret: Arc<WebhookSecret>,
    /// Producer side of the delivery queue
    pub queue: webhooks::DeliveryQueue,
    /// Raised once the bot has joined its channel
    pub irc_ready: ReadyLatch,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        config: Config,
        secret: WebhookSecret,
        queue: webhooks::DeliveryQueue,
        irc_ready: ReadyLatch,
    ) -> Self {
        Self {
            config: Arc::new(config),
            secret: Arc::new(secret),
            queue,
            irc_ready,
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // GitHub deliveries
        .route(&state.config.webhook_path, post(webhooks::handlers::receive))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether the bot has joined its IRC channel
    irc_ready: bool,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        irc_ready: state.irc_ready.is_latched(),
    })
}
