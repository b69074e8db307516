//! Price Cache Types
//!
//! Domain types for the last-known price of each ticker.
//!
//! # Design
//!
//! A single `PriceStore` is shared by the stream client (written on every
//! trade frame) and the fallback fetcher (written on a successful pull).
//! Writes are last-write-wins: there is no ordering or versioning between
//! the two sources, so a fallback result that lands just after a streamed
//! trade replaces it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

// =============================================================================
// Types
// =============================================================================

/// A ticker symbol. Case-sensitive, no normalization is performed.
pub type Ticker = String;

/// Where a cached price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Trade frame from the streaming feed.
    Stream,
    /// One-shot REST quote.
    Fallback,
}

impl PriceSource {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Fallback => "fallback",
        }
    }
}

/// Last-known price for a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceEntry {
    /// The ticker this price belongs to.
    pub ticker: Ticker,
    /// Last reported price.
    pub price: Decimal,
    /// When the source reported this price.
    pub source_last_updated: DateTime<Utc>,
    /// Which source wrote the entry.
    pub source: PriceSource,
}

impl PriceEntry {
    /// Create a new price entry.
    #[must_use]
    pub fn new(
        ticker: impl Into<Ticker>,
        price: Decimal,
        source_last_updated: DateTime<Utc>,
        source: PriceSource,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            price,
            source_last_updated,
            source,
        }
    }
}

// =============================================================================
// Price Store
// =============================================================================

/// Thread-safe map from ticker to its last-known price.
///
/// At most one entry exists per ticker; `upsert` replaces whatever is there.
#[derive(Debug, Default)]
pub struct PriceStore {
    entries: RwLock<HashMap<Ticker, PriceEntry>>,
}

impl PriceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `entry.ticker`.
    ///
    /// Returns the entry that was replaced, if any.
    pub fn upsert(&self, entry: PriceEntry) -> Option<PriceEntry> {
        self.entries.write().insert(entry.ticker.clone(), entry)
    }

    /// Get the cached entry for a ticker.
    #[must_use]
    pub fn get(&self, ticker: &str) -> Option<PriceEntry> {
        self.entries.read().get(ticker).cloned()
    }

    /// Get only the cached price for a ticker.
    #[must_use]
    pub fn price(&self, ticker: &str) -> Option<Decimal> {
        self.entries.read().get(ticker).map(|e| e.price)
    }

    /// Remove the entry for a ticker.
    pub fn remove(&self, ticker: &str) -> Option<PriceEntry> {
        self.entries.write().remove(ticker)
    }

    /// Remove the entries for several tickers under one write lock.
    ///
    /// Returns how many entries were actually removed.
    pub fn remove_many(&self, tickers: &[Ticker]) -> usize {
        let mut entries = self.entries.write();
        tickers
            .iter()
            .filter(|t| entries.remove(t.as_str()).is_some())
            .count()
    }

    /// Number of cached prices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ticker: &str, price: i64, source: PriceSource) -> PriceEntry {
        PriceEntry::new(ticker, Decimal::new(price, 0), Utc::now(), source)
    }

    #[test]
    fn upsert_then_get() {
        let store = PriceStore::new();

        store.upsert(entry("AAPL", 150, PriceSource::Stream));

        assert_eq!(store.price("AAPL"), Some(Decimal::new(150, 0)));
        assert_eq!(store.get("AAPL").unwrap().source, PriceSource::Stream);
    }

    #[test]
    fn tickers_are_case_sensitive() {
        let store = PriceStore::new();

        store.upsert(entry("AAPL", 150, PriceSource::Stream));

        assert!(store.get("aapl").is_none());
    }

    #[test]
    fn last_write_wins_across_sources() {
        let store = PriceStore::new();

        store.upsert(entry("AAPL", 150, PriceSource::Stream));
        let replaced = store.upsert(entry("AAPL", 149, PriceSource::Fallback));

        assert_eq!(replaced.unwrap().price, Decimal::new(150, 0));
        let current = store.get("AAPL").unwrap();
        assert_eq!(current.price, Decimal::new(149, 0));
        assert_eq!(current.source, PriceSource::Fallback);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_many_counts_only_present() {
        let store = PriceStore::new();
        store.upsert(entry("AAPL", 150, PriceSource::Stream));
        store.upsert(entry("MSFT", 300, PriceSource::Stream));

        let removed = store.remove_many(&["AAPL".to_string(), "GOOG".to_string()]);

        assert_eq!(removed, 1);
        assert!(store.get("AAPL").is_none());
        assert!(store.get("MSFT").is_some());
    }

    #[test]
    fn remove_missing_is_none() {
        let store = PriceStore::new();
        assert!(store.remove("AAPL").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn price_source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PriceSource::Fallback).unwrap(),
            "\"fallback\""
        );
    }
}
