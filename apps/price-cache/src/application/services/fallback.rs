//! Fallback Quote Fetcher
//!
//! One-shot REST lookup used when no streamed price is cached. A successful
//! result is written into the shared price store so later lookups see it.
//! Never touches the stream subscription.

use std::sync::Arc;
use std::time::Instant;

use crate::application::ports::QuotePort;
use crate::domain::price::{PriceEntry, PriceSource, PriceStore};
use crate::error::UpstreamError;
use crate::infrastructure::metrics;

/// REST fallback for cold tickers.
pub struct FallbackQuoteFetcher {
    quotes: Arc<dyn QuotePort>,
    prices: Arc<PriceStore>,
}

impl FallbackQuoteFetcher {
    /// Create a fetcher writing into `prices`.
    #[must_use]
    pub fn new(quotes: Arc<dyn QuotePort>, prices: Arc<PriceStore>) -> Self {
        Self { quotes, prices }
    }

    /// Fetch the current price for a ticker and cache it.
    ///
    /// No lock is held while the request is in flight.
    ///
    /// # Errors
    ///
    /// Returns the provider error; the store is left unchanged.
    pub async fn fetch(&self, ticker: &str) -> Result<PriceEntry, UpstreamError> {
        let started = Instant::now();
        let result = self.quotes.fetch_quote(ticker).await;
        metrics::record_fallback_fetch(result.is_ok(), started.elapsed());

        match result {
            Ok(quote) => {
                let entry = PriceEntry::new(
                    ticker,
                    quote.price,
                    quote.timestamp,
                    PriceSource::Fallback,
                );
                self.prices.upsert(entry.clone());
                tracing::debug!(ticker, price = %entry.price, "Fallback price cached");
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!(ticker, error = %e, "Fallback quote fetch failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for FallbackQuoteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackQuoteFetcher")
            .field("cached_prices", &self.prices.len())
            .finish_non_exhaustive()
    }
}
