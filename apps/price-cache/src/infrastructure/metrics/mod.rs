//! Prometheus Metrics Module
//!
//! Exposes cache metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Requests**: Price requests by outcome, fallback fetches by result
//! - **Stream**: Frames by kind, malformed frames, subscribes, reconnects
//! - **Lifecycle**: Swept tickers, market status refreshes
//! - **State**: Tracked tickers, cached prices, stream connection
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "price_cache_price_requests_total",
        "Price requests by resolution outcome"
    );
    describe_counter!(
        "price_cache_fallback_fetches_total",
        "REST fallback fetches by result"
    );
    describe_histogram!(
        "price_cache_fallback_fetch_seconds",
        "REST fallback fetch latency"
    );

    describe_counter!(
        "price_cache_stream_frames_total",
        "Inbound stream frames by kind"
    );
    describe_counter!(
        "price_cache_stream_malformed_frames_total",
        "Inbound stream frames discarded as malformed"
    );
    describe_counter!(
        "price_cache_subscribe_attempts_total",
        "Subscribe control messages by outcome"
    );
    describe_counter!(
        "price_cache_reconnects_total",
        "Stream reconnection attempts"
    );

    describe_counter!(
        "price_cache_swept_tickers_total",
        "Tickers removed by the idle sweep"
    );
    describe_counter!(
        "price_cache_market_status_refreshes_total",
        "Market status refreshes by result"
    );

    describe_gauge!("price_cache_tracked_tickers", "Tickers in the registry");
    describe_gauge!("price_cache_cached_prices", "Tickers with a cached price");
    describe_gauge!(
        "price_cache_stream_connected",
        "1 when the stream connection is open"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a resolved or unavailable price request.
pub fn record_price_request(outcome: &'static str) {
    counter!("price_cache_price_requests_total", "outcome" => outcome).increment(1);
}

/// Record a fallback fetch and its latency.
pub fn record_fallback_fetch(success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    counter!("price_cache_fallback_fetches_total", "result" => result).increment(1);
    histogram!("price_cache_fallback_fetch_seconds").record(duration.as_secs_f64());
}

/// Record an inbound stream frame.
pub fn record_stream_frame(kind: &'static str) {
    counter!("price_cache_stream_frames_total", "kind" => kind).increment(1);
}

/// Record a discarded stream frame.
pub fn record_malformed_frame() {
    counter!("price_cache_stream_malformed_frames_total").increment(1);
}

/// Record a subscribe attempt.
pub fn record_subscribe(outcome: &'static str) {
    counter!("price_cache_subscribe_attempts_total", "outcome" => outcome).increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("price_cache_reconnects_total").increment(1);
}

/// Record tickers removed by a sweep.
pub fn record_swept(count: usize) {
    counter!("price_cache_swept_tickers_total").increment(count as u64);
}

/// Record a market status refresh.
pub fn record_market_refresh(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("price_cache_market_status_refreshes_total", "result" => result).increment(1);
}

/// Update the tracked-ticker and cached-price gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_cache_sizes(tracked: usize, cached: usize) {
    gauge!("price_cache_tracked_tickers").set(tracked as f64);
    gauge!("price_cache_cached_prices").set(cached as f64);
}

/// Update the stream connection gauge.
pub fn set_stream_connected(connected: bool) {
    gauge!("price_cache_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
