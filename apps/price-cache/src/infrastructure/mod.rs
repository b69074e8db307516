//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the HTTP surface
//! and process-wide concerns (configuration, metrics, tracing).

/// Alpha Vantage market calendar adapter.
pub mod alphavantage;

/// Configuration loaded from the environment.
pub mod config;

/// Finnhub trade stream and quote adapters.
pub mod finnhub;

/// HTTP API, health checks and metrics endpoint.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
