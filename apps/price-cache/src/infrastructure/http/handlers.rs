//! Request handlers and response bodies.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use super::AppState;
use super::error::ApiError;
use crate::application::ports::StreamStatsSnapshot;
use crate::application::services::{PriceResolution, UnavailableReason};
use crate::domain::market::MarketStatus;
use crate::domain::price::{PriceSource, Ticker};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Price
// =============================================================================

/// Body of a price response. `price` is `null` when unavailable.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PriceResponse {
    /// Requested ticker.
    pub ticker: Ticker,
    /// Last-known price.
    pub price: Option<Decimal>,
    /// Which source produced the price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PriceSource>,
    /// When the source reported the price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_last_updated: Option<DateTime<Utc>>,
    /// Why no price was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    /// Failure detail for `fetch_failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PriceResolution> for PriceResponse {
    fn from(resolution: PriceResolution) -> Self {
        match resolution {
            PriceResolution::Resolved(entry) => Self {
                ticker: entry.ticker,
                price: Some(entry.price),
                source: Some(entry.source),
                source_last_updated: Some(entry.source_last_updated),
                reason: None,
                error: None,
            },
            PriceResolution::Unavailable { ticker, reason } => {
                let error = match &reason {
                    UnavailableReason::FetchFailed(e) => Some(e.to_string()),
                    UnavailableReason::MarketClosed => None,
                };
                Self {
                    ticker,
                    price: None,
                    source: None,
                    source_last_updated: None,
                    reason: Some(reason.as_str()),
                    error,
                }
            }
        }
    }
}

pub(super) async fn price_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<PriceResponse>, ApiError> {
    if ticker.trim().is_empty() {
        return Err(ApiError::validation("ticker must not be empty"));
    }

    let span = tracing::info_span!(
        "price_request",
        request_id = %uuid::Uuid::new_v4(),
        ticker = %ticker
    );
    let resolution = state
        .orchestrator
        .get_price(&ticker)
        .instrument(span)
        .await;

    Ok(Json(resolution.into()))
}

// =============================================================================
// Market Status
// =============================================================================

pub(super) async fn market_status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MarketStatus>, ApiError> {
    Ok(Json(state.orchestrator.get_market_status()?))
}

// =============================================================================
// Subscribe
// =============================================================================

/// Body of a bulk subscribe response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// Tickers sent to the stream.
    pub subscribed: Vec<Ticker>,
    /// Tickers dropped because the stream was not connected.
    pub dropped: Vec<Ticker>,
}

pub(super) async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let tickers = body
        .get("tickers")
        .ok_or_else(|| ApiError::validation("tickers is required"))?;

    let report = state.orchestrator.subscribe_many(tickers)?;

    Ok(Json(SubscribeResponse {
        subscribed: report.sent,
        dropped: report.dropped,
    }))
}

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Stream connection counters.
    pub stream: StreamStatsSnapshot,
    /// Whether a market schedule is cached.
    pub market_status_available: bool,
    /// Tickers in the subscription registry.
    pub tracked_tickers: usize,
    /// Entries in the price cache.
    pub cached_prices: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Stream connected and schedule cached.
    Healthy,
    /// One of the two is missing.
    Degraded,
    /// Neither is available.
    Unhealthy,
}

pub(super) async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.orchestrator.stream_connected() && state.orchestrator.market_status_available() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let stream = state.orchestrator.stream_stats();
    let market_status_available = state.orchestrator.market_status_available();

    HealthResponse {
        status: determine_health_status(stream.connected, market_status_available),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        stream,
        market_status_available,
        tracked_tickers: state.orchestrator.tracked_tickers(),
        cached_prices: state.orchestrator.cached_prices(),
    }
}

const fn determine_health_status(stream_connected: bool, market_available: bool) -> HealthStatus {
    match (stream_connected, market_available) {
        (true, true) => HealthStatus::Healthy,
        (false, false) => HealthStatus::Unhealthy,
        _ => HealthStatus::Degraded,
    }
}
