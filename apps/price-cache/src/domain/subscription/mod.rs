//! Subscription Tracking Types
//!
//! Domain types for tracking which tickers are live and when each was last
//! requested.
//!
//! # Design
//!
//! The registry tracks:
//! - The last access instant of every requested ticker
//! - Expiry of tickers idle beyond a threshold
//!
//! Expiry removes the subscription record *and* the ticker's cached price
//! together. The registry lock is taken first and held while the price store
//! is cleared, so a concurrent request sees either the pre-sweep or the
//! post-sweep state. Lock order is always registry, then prices.
//!
//! [`SubscriptionRegistry::track`] and [`SubscriptionRegistry::sweep_with`]
//! run their callbacks while the registry lock is held. Upstream subscribe
//! and unsubscribe calls made from them are therefore issued in the same
//! order as the record changes they belong to. Callbacks must not re-enter
//! the registry.
//!
//! Instants are passed in by the caller so the rules stay pure and testable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::price::{PriceStore, Ticker};

// =============================================================================
// Types
// =============================================================================

/// Per-ticker access record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    /// The tracked ticker.
    pub ticker: Ticker,
    /// Last time the ticker was requested.
    pub last_access: DateTime<Utc>,
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Tickers whose records were removed.
    pub expired: Vec<Ticker>,
    /// Cached prices removed alongside them.
    pub prices_removed: usize,
}

impl SweepOutcome {
    /// Check if nothing expired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty()
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe registry of tracked tickers.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    records: RwLock<HashMap<Ticker, DateTime<Utc>>>,
    prices: Arc<PriceStore>,
}

impl SubscriptionRegistry {
    /// Create an empty registry that evicts from `prices` on sweep.
    #[must_use]
    pub fn new(prices: Arc<PriceStore>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            prices,
        }
    }

    /// Record an access at `now`, creating the record if needed.
    ///
    /// Returns `true` if the ticker was not tracked before.
    pub fn touch(&self, ticker: &str, now: DateTime<Utc>) -> bool {
        self.track(ticker, now, |_| {})
    }

    /// Like [`touch`](Self::touch), running `on_new` under the registry lock
    /// when the record is created.
    pub fn track(&self, ticker: &str, now: DateTime<Utc>, on_new: impl FnOnce(&str)) -> bool {
        let mut records = self.records.write();
        if let Some(last_access) = records.get_mut(ticker) {
            *last_access = now;
            return false;
        }

        records.insert(ticker.to_string(), now);
        on_new(ticker);
        true
    }

    /// Check if a record exists for the ticker.
    #[must_use]
    pub fn is_tracked(&self, ticker: &str) -> bool {
        self.records.read().contains_key(ticker)
    }

    /// Last access instant for the ticker.
    #[must_use]
    pub fn last_access(&self, ticker: &str) -> Option<DateTime<Utc>> {
        self.records.read().get(ticker).copied()
    }

    /// Snapshot of one record.
    #[must_use]
    pub fn record(&self, ticker: &str) -> Option<SubscriptionRecord> {
        self.last_access(ticker).map(|last_access| SubscriptionRecord {
            ticker: ticker.to_string(),
            last_access,
        })
    }

    /// All tracked tickers, sorted.
    #[must_use]
    pub fn tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<_> = self.records.read().keys().cloned().collect();
        tickers.sort();
        tickers
    }

    /// Number of tracked tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// The price store evicted from on sweep.
    #[must_use]
    pub fn prices(&self) -> &PriceStore {
        &self.prices
    }

    /// Remove every record idle for strictly longer than `idle_threshold`,
    /// together with its cached price.
    pub fn sweep(&self, idle_threshold: Duration, now: DateTime<Utc>) -> SweepOutcome {
        self.sweep_with(idle_threshold, now, |_| {})
    }

    /// Like [`sweep`](Self::sweep), running `on_expired` for each removed
    /// ticker before the registry lock is released.
    pub fn sweep_with(
        &self,
        idle_threshold: Duration,
        now: DateTime<Utc>,
        mut on_expired: impl FnMut(&str),
    ) -> SweepOutcome {
        let threshold = chrono::Duration::from_std(idle_threshold).unwrap_or(chrono::Duration::MAX);

        let mut records = self.records.write();

        let mut expired: Vec<Ticker> = records
            .iter()
            .filter(|(_, last_access)| now.signed_duration_since(**last_access) > threshold)
            .map(|(ticker, _)| ticker.clone())
            .collect();
        expired.sort();

        for ticker in &expired {
            records.remove(ticker);
        }

        let prices_removed = self.prices.remove_many(&expired);
        for ticker in &expired {
            on_expired(ticker);
        }
        drop(records);

        SweepOutcome {
            expired,
            prices_removed,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::{PriceEntry, PriceSource};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    const HOUR: Duration = Duration::from_secs(3600);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 14, 0, 0).unwrap()
    }

    fn setup() -> (Arc<PriceStore>, SubscriptionRegistry) {
        let prices = Arc::new(PriceStore::new());
        let registry = SubscriptionRegistry::new(Arc::clone(&prices));
        (prices, registry)
    }

    fn cache(prices: &PriceStore, ticker: &str) {
        prices.upsert(PriceEntry::new(
            ticker,
            Decimal::new(100, 0),
            t0(),
            PriceSource::Stream,
        ));
    }

    #[test]
    fn touch_creates_then_updates() {
        let (_, registry) = setup();

        assert!(registry.touch("AAPL", t0()));
        assert!(!registry.touch("AAPL", t0() + chrono::Duration::minutes(5)));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.last_access("AAPL"),
            Some(t0() + chrono::Duration::minutes(5))
        );
    }

    #[test]
    fn untouched_is_not_tracked() {
        let (_, registry) = setup();
        registry.touch("AAPL", t0());

        assert!(registry.is_tracked("AAPL"));
        assert!(!registry.is_tracked("MSFT"));
        assert!(!registry.is_tracked("aapl"));
    }

    #[test]
    fn sweep_removes_idle_record_and_price() {
        let (prices, registry) = setup();
        registry.touch("AAPL", t0());
        cache(&prices, "AAPL");

        let outcome = registry.sweep(HOUR, t0() + chrono::Duration::minutes(61));

        assert_eq!(outcome.expired, vec!["AAPL".to_string()]);
        assert_eq!(outcome.prices_removed, 1);
        assert!(!registry.is_tracked("AAPL"));
        assert!(prices.get("AAPL").is_none());
    }

    #[test]
    fn sweep_keeps_recent_record_and_price() {
        let (prices, registry) = setup();
        registry.touch("AAPL", t0());
        registry.touch("MSFT", t0() + chrono::Duration::minutes(30));
        cache(&prices, "AAPL");
        cache(&prices, "MSFT");

        let outcome = registry.sweep(HOUR, t0() + chrono::Duration::minutes(61));

        assert_eq!(outcome.expired, vec!["AAPL".to_string()]);
        assert!(registry.is_tracked("MSFT"));
        assert!(prices.get("MSFT").is_some());
    }

    #[test]
    fn sweep_boundary_is_strict() {
        let (_, registry) = setup();
        registry.touch("AAPL", t0());

        let outcome = registry.sweep(HOUR, t0() + chrono::Duration::hours(1));

        assert!(outcome.is_empty());
        assert!(registry.is_tracked("AAPL"));
    }

    #[test]
    fn sweep_leaves_untracked_prices_alone() {
        let (prices, registry) = setup();
        cache(&prices, "GOOG");

        let outcome = registry.sweep(HOUR, t0() + chrono::Duration::hours(5));

        assert!(outcome.is_empty());
        assert!(prices.get("GOOG").is_some());
    }

    #[test]
    fn expired_ticker_with_no_price_counts_zero() {
        let (_, registry) = setup();
        registry.touch("AAPL", t0());

        let outcome = registry.sweep(HOUR, t0() + chrono::Duration::hours(2));

        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(outcome.prices_removed, 0);
    }

    #[test]
    fn track_runs_callback_only_on_create() {
        let (_, registry) = setup();
        let mut created = Vec::new();

        assert!(registry.track("AAPL", t0(), |t| created.push(t.to_string())));
        assert!(!registry.track("AAPL", t0(), |t| created.push(t.to_string())));

        assert_eq!(created, vec!["AAPL".to_string()]);
    }

    #[test]
    fn sweep_with_reports_each_expired_ticker() {
        let (_, registry) = setup();
        registry.touch("MSFT", t0());
        registry.touch("AAPL", t0());
        registry.touch("NVDA", t0() + chrono::Duration::hours(2));
        let mut expired = Vec::new();

        registry.sweep_with(HOUR, t0() + chrono::Duration::hours(2), |t| {
            expired.push(t.to_string());
        });

        assert_eq!(expired, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn track_after_sweep_recreates_record() {
        let (_, registry) = setup();
        registry.touch("AAPL", t0());
        registry.sweep(HOUR, t0() + chrono::Duration::hours(2));

        let mut created = 0;
        assert!(registry.track("AAPL", t0() + chrono::Duration::hours(2), |_| created += 1));
        assert_eq!(created, 1);
    }

    #[test]
    fn concurrent_track_and_sweep_alternate_per_ticker() {
        let (_, registry) = setup();
        let registry = Arc::new(registry);
        let log = Arc::new(parking_lot::Mutex::new(Vec::<(String, bool)>::new()));

        let workers: Vec<_> = (0..4)
            .map(|w| {
                let registry = Arc::clone(&registry);
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let ticker = format!("T{}", (i + w) % 5);
                        let now = t0() + chrono::Duration::seconds(i);
                        if w == 0 && i % 3 == 0 {
                            registry.sweep_with(Duration::ZERO, now + chrono::Duration::hours(1), |t| {
                                log.lock().push((t.to_string(), false));
                            });
                        } else {
                            registry.track(&ticker, now, |t| log.lock().push((t.to_string(), true)));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let log = log.lock();
        for i in 0..5 {
            let ticker = format!("T{i}");
            let events: Vec<bool> = log
                .iter()
                .filter(|(t, _)| *t == ticker)
                .map(|(_, created)| *created)
                .collect();
            for pair in events.windows(2) {
                assert_ne!(pair[0], pair[1], "{ticker}: {events:?}");
            }
            assert_eq!(events.last() == Some(&true), registry.is_tracked(&ticker));
        }
    }

    #[test]
    fn tickers_are_sorted() {
        let (_, registry) = setup();
        registry.touch("MSFT", t0());
        registry.touch("AAPL", t0());

        assert_eq!(registry.tickers(), vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(registry.record("AAPL").unwrap().last_access, t0());
    }

    proptest! {
        #[test]
        fn sweep_expires_exactly_the_idle(ages in proptest::collection::vec(0i64..7200, 1..20)) {
            let (prices, registry) = setup();
            let now = t0() + chrono::Duration::hours(3);

            for (i, age) in ages.iter().enumerate() {
                let ticker = format!("T{i}");
                registry.touch(&ticker, now - chrono::Duration::seconds(*age));
                cache(&prices, &ticker);
            }

            let outcome = registry.sweep(HOUR, now);

            for (i, age) in ages.iter().enumerate() {
                let ticker = format!("T{i}");
                let idle = *age > 3600;
                prop_assert_eq!(outcome.expired.contains(&ticker), idle);
                prop_assert_eq!(registry.is_tracked(&ticker), !idle);
                prop_assert_eq!(prices.get(&ticker).is_some(), !idle);
            }
        }
    }
}
