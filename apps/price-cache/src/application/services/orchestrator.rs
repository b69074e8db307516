//! Price Cache Orchestrator
//!
//! Resolves a price request by coordinating the market schedule, the stream
//! feed, the subscription registry and the REST fallback.
//!
//! # Resolution Order
//!
//! 1. No cached schedule: refresh it first
//! 2. Market closed: unavailable, nothing else is called
//! 3. Record the access; a ticker that was not tracked is subscribed
//! 4. Streamed price cached: return it
//! 5. Otherwise fetch once over REST and cache the result
//!
//! The stream read never waits for a frame. A cold ticker falls through to
//! the fallback on its first request and is served from the stream after.
//!
//! Subscribes and sweep unsubscribes are issued under the registry lock, so
//! a ticker swept while its request is in flight is subscribed again when
//! that request records its access.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::application::ports::{Clock, StreamFeedPort, StreamStatsSnapshot, SubscribeOutcome};
use crate::application::services::{FallbackQuoteFetcher, MarketStatusService};
use crate::domain::market::MarketStatus;
use crate::domain::price::{PriceEntry, Ticker};
use crate::domain::subscription::{SubscriptionRegistry, SweepOutcome};
use crate::error::CacheError;
use crate::infrastructure::metrics;

// =============================================================================
// Results
// =============================================================================

/// Why a price could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Market is closed or its schedule is unknown.
    MarketClosed,
    /// No streamed price and the fallback fetch failed.
    FetchFailed(CacheError),
}

impl UnavailableReason {
    /// Label used in responses and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MarketClosed => "market_closed",
            Self::FetchFailed(_) => "fetch_failed",
        }
    }
}

/// Outcome of a price request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceResolution {
    /// A cached or freshly fetched price.
    Resolved(PriceEntry),
    /// No price could be produced.
    Unavailable {
        /// The requested ticker.
        ticker: Ticker,
        /// Why.
        reason: UnavailableReason,
    },
}

impl PriceResolution {
    /// The resolved entry, if any.
    #[must_use]
    pub const fn entry(&self) -> Option<&PriceEntry> {
        match self {
            Self::Resolved(entry) => Some(entry),
            Self::Unavailable { .. } => None,
        }
    }

    const fn metric_label(&self) -> &'static str {
        match self {
            Self::Resolved(entry) => match entry.source {
                crate::domain::price::PriceSource::Stream => "resolved_stream",
                crate::domain::price::PriceSource::Fallback => "resolved_fallback",
            },
            Self::Unavailable { reason, .. } => reason.as_str(),
        }
    }
}

/// Per-ticker result of a bulk subscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSubscribeReport {
    /// Tickers handed to the open connection.
    pub sent: Vec<Ticker>,
    /// Tickers dropped because no connection was open.
    pub dropped: Vec<Ticker>,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Idle time after which a ticker is swept.
    pub idle_threshold: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_threshold: Duration::from_secs(3600),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Façade over the cache's collaborators.
///
/// Constructed once at startup and shared by handle with request handlers
/// and scheduled jobs.
pub struct PriceCacheOrchestrator {
    market: Arc<MarketStatusService>,
    stream: Arc<dyn StreamFeedPort>,
    fallback: Arc<FallbackQuoteFetcher>,
    registry: Arc<SubscriptionRegistry>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl PriceCacheOrchestrator {
    /// Wire the orchestrator.
    #[must_use]
    pub fn new(
        market: Arc<MarketStatusService>,
        stream: Arc<dyn StreamFeedPort>,
        fallback: Arc<FallbackQuoteFetcher>,
        registry: Arc<SubscriptionRegistry>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            market,
            stream,
            fallback,
            registry,
            clock,
            config,
        }
    }

    /// Resolve the price for a ticker.
    #[tracing::instrument(skip(self), fields(outcome = tracing::field::Empty))]
    pub async fn get_price(&self, ticker: &str) -> PriceResolution {
        let resolution = self.resolve(ticker).await;
        tracing::Span::current().record("outcome", resolution.metric_label());
        metrics::record_price_request(resolution.metric_label());
        resolution
    }

    async fn resolve(&self, ticker: &str) -> PriceResolution {
        if !self.market.is_available() {
            // Failure is logged by the service; an absent status reads as closed.
            let _ = self.market.refresh().await;
        }

        if !self.market.is_open() {
            tracing::debug!(ticker, "Market closed, skipping stream and fallback");
            return PriceResolution::Unavailable {
                ticker: ticker.to_string(),
                reason: UnavailableReason::MarketClosed,
            };
        }

        self.record_access(ticker);

        if let Some(entry) = self.stream.price(ticker) {
            self.record_access(ticker);
            return PriceResolution::Resolved(entry);
        }

        match self.fallback.fetch(ticker).await {
            Ok(entry) => {
                self.record_access(ticker);
                PriceResolution::Resolved(entry)
            }
            Err(e) => PriceResolution::Unavailable {
                ticker: ticker.to_string(),
                reason: UnavailableReason::FetchFailed(e.into()),
            },
        }
    }

    /// Touch the ticker, subscribing it if the registry had no record.
    fn record_access(&self, ticker: &str) {
        let now = self.clock.now();
        self.registry.track(ticker, now, |ticker| {
            let outcome = self.stream.subscribe(ticker);
            metrics::record_subscribe(outcome.as_str());
            if outcome == SubscribeOutcome::NotConnected {
                tracing::warn!(ticker, "Stream not connected, subscribe dropped");
            }
        });
    }

    /// The cached market status with its open/closed state recomputed now.
    ///
    /// # Errors
    ///
    /// Returns `NotYetInitialized` if no status has ever been fetched.
    pub fn get_market_status(&self) -> Result<MarketStatus, CacheError> {
        self.market
            .current_status()
            .ok_or(CacheError::NotYetInitialized)
    }

    /// Subscribe every ticker in `tickers` without tracking access.
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless `tickers` is an array of strings; nothing
    /// is subscribed in that case.
    pub fn subscribe_many(&self, tickers: &Value) -> Result<BulkSubscribeReport, CacheError> {
        let Value::Array(items) = tickers else {
            return Err(CacheError::Validation(
                "tickers must be an array".to_string(),
            ));
        };

        let tickers = items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CacheError::Validation(format!("ticker must be a string, got {item}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = BulkSubscribeReport::default();
        for ticker in tickers {
            let outcome = self.stream.subscribe(&ticker);
            metrics::record_subscribe(outcome.as_str());
            match outcome {
                SubscribeOutcome::Sent => report.sent.push(ticker),
                SubscribeOutcome::NotConnected => report.dropped.push(ticker),
            }
        }

        tracing::info!(
            sent = report.sent.len(),
            dropped = report.dropped.len(),
            "Bulk subscribe"
        );

        Ok(report)
    }

    /// Refresh the cached market schedule. Errors are logged by the service.
    pub async fn refresh_market_status(&self) {
        let _ = self.market.refresh().await;
    }

    /// Expire idle tickers and unsubscribe them upstream.
    pub fn sweep(&self) -> SweepOutcome {
        let outcome = self
            .registry
            .sweep_with(self.config.idle_threshold, self.clock.now(), |ticker| {
                if self.stream.unsubscribe(ticker) == SubscribeOutcome::NotConnected {
                    tracing::debug!(ticker, "Stream not connected, unsubscribe dropped");
                }
            });

        metrics::record_swept(outcome.expired.len());
        metrics::set_cache_sizes(self.registry.len(), self.registry.prices().len());

        if !outcome.is_empty() {
            tracing::info!(
                expired = outcome.expired.len(),
                prices_removed = outcome.prices_removed,
                remaining = self.registry.len(),
                "Swept idle tickers"
            );
        }

        outcome
    }

    /// Number of tracked tickers.
    #[must_use]
    pub fn tracked_tickers(&self) -> usize {
        self.registry.len()
    }

    /// Number of cached prices.
    #[must_use]
    pub fn cached_prices(&self) -> usize {
        self.registry.prices().len()
    }

    /// Whether a market status has been cached.
    #[must_use]
    pub fn market_status_available(&self) -> bool {
        self.market.is_available()
    }

    /// Whether the stream connection is open.
    #[must_use]
    pub fn stream_connected(&self) -> bool {
        self.stream.is_connected()
    }

    /// Counters of the stream connection used for resolution.
    #[must_use]
    pub fn stream_stats(&self) -> StreamStatsSnapshot {
        self.stream.stats()
    }
}

impl std::fmt::Debug for PriceCacheOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceCacheOrchestrator")
            .field("config", &self.config)
            .field("tracked_tickers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
