//! HTTP API, Health Checks and Metrics
//!
//! # Endpoints
//!
//! - `GET|POST /price/{ticker}` - Resolve a price (also under `/webSocket`)
//! - `GET /getMarketStatus` - Cached market schedule with live status
//! - `GET|POST /subscribe` - Bulk subscribe, body `{"tickers": [..]}`
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe
//! - `GET /readyz` - Readiness probe (stream connected, schedule cached)
//! - `GET /metrics` - Prometheus metrics in text format

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::PriceCacheOrchestrator;

pub use error::{ApiError, ErrorBody};
pub use handlers::{HealthResponse, HealthStatus, PriceResponse, SubscribeResponse};

// =============================================================================
// State
// =============================================================================

/// Shared state for request handlers.
pub struct AppState {
    version: String,
    started_at: Instant,
    orchestrator: Arc<PriceCacheOrchestrator>,
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(version: String, orchestrator: Arc<PriceCacheOrchestrator>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            orchestrator,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("version", &self.version)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

/// Build the router with every endpoint.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/price/{ticker}",
            get(handlers::price_handler).post(handlers::price_handler),
        )
        .route(
            "/webSocket/price/{ticker}",
            get(handlers::price_handler).post(handlers::price_handler),
        )
        .route("/getMarketStatus", get(handlers::market_status_handler))
        .route("/getMarketStatus/", get(handlers::market_status_handler))
        .route(
            "/subscribe",
            get(handlers::subscribe_handler).post(handlers::subscribe_handler),
        )
        .route("/health", get(handlers::health_handler))
        .route("/healthz", get(handlers::liveness_handler))
        .route("/readyz", get(handlers::readiness_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server for the API and health endpoints.
#[derive(Debug)]
pub struct HttpServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server hits a fatal
    /// error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let app = create_router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
