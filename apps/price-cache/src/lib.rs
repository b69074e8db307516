#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Cache - Real-time price cache with subscription lifecycle
//!
//! Keeps the last-known price of every requested ticker, fed by a single
//! streaming connection, with a one-shot REST quote for tickers the stream
//! has not reported yet. All price activity is gated on a periodically
//! refreshed market schedule. Tickers nobody asks for are expired.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and rules
//!   - `price`: Price entries and the shared price store
//!   - `market`: Market schedule, session times, open/closed evaluation
//!   - `subscription`: Access tracking and idle expiry
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Calendar, quote and stream interfaces, clock
//!   - `services`: Market status, fallback, orchestrator, scheduler
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `finnhub`: Trade stream WebSocket client, quote REST client
//!   - `alphavantage`: Market calendar REST client
//!   - `http`: API, health and metrics endpoints
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! trade stream ──► StreamFeedClient ──► PriceStore ◄── FallbackQuoteFetcher ◄── quote API
//!                        ▲                  ▲                  ▲
//!                        │ subscribe        │ read             │ fetch
//!                        └──────── PriceCacheOrchestrator ─────┘
//!                                   ▲               │ is open?
//!                            HTTP request     MarketStatusService ◄── calendar API
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Error taxonomy shared across layers.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{MarketRecord, MarketState, MarketStatus, SessionTime};
pub use domain::price::{PriceEntry, PriceSource, PriceStore, Ticker};
pub use domain::subscription::{SubscriptionRegistry, SweepOutcome};

// Ports and services
pub use application::ports::{
    Clock, ManualClock, MarketCalendarPort, Quote, QuotePort, StreamFeedPort, StreamStatsSnapshot,
    SubscribeOutcome, SystemClock,
};
pub use application::services::{
    BulkSubscribeReport, FallbackQuoteFetcher, MarketStatusConfig, MarketStatusService,
    OrchestratorConfig, PeriodicScheduler, PriceCacheOrchestrator, PriceResolution,
    UnavailableReason,
};

// Errors
pub use error::{CacheError, FrameError, MarketStatusError, UpstreamError};

// Infrastructure config
pub use infrastructure::config::{ConfigError, PriceCacheConfig};

// Adapters
pub use infrastructure::alphavantage::AlphaVantageCalendarClient;
pub use infrastructure::finnhub::{
    FinnhubQuoteClient, StreamClientConfig, StreamClientError, StreamFeedClient,
};

// HTTP server
pub use infrastructure::http::{AppState, HttpServer, HttpServerError, create_router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
