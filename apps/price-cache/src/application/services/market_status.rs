//! Market Status Service
//!
//! Fetches and caches the target market's open/close schedule and answers
//! "is the market open now". Unknown state is treated as closed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;

use crate::application::ports::{Clock, MarketCalendarPort};
use crate::domain::market::MarketStatus;
use crate::error::MarketStatusError;
use crate::infrastructure::metrics;

/// Which market to track.
#[derive(Debug, Clone)]
pub struct MarketStatusConfig {
    /// Provider region name to select, e.g. "United States".
    pub region: String,
    /// The exchange's timezone.
    pub timezone: Tz,
}

impl Default for MarketStatusConfig {
    fn default() -> Self {
        Self {
            region: "United States".to_string(),
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// Cached market schedule.
pub struct MarketStatusService {
    calendar: Arc<dyn MarketCalendarPort>,
    clock: Arc<dyn Clock>,
    config: MarketStatusConfig,
    status: RwLock<Option<MarketStatus>>,
}

impl MarketStatusService {
    /// Create a service with no cached status.
    #[must_use]
    pub fn new(
        calendar: Arc<dyn MarketCalendarPort>,
        clock: Arc<dyn Clock>,
        config: MarketStatusConfig,
    ) -> Self {
        Self {
            calendar,
            clock,
            config,
            status: RwLock::new(None),
        }
    }

    /// Fetch the schedule and replace the cached status.
    ///
    /// On any error the previous status is left untouched and the error is
    /// logged and returned.
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails, the region is missing, or the
    /// open/close times cannot be anchored.
    pub async fn refresh(&self) -> Result<MarketStatus, MarketStatusError> {
        let result = self.fetch().await;

        match &result {
            Ok(status) => {
                *self.status.write() = Some(status.clone());
                metrics::record_market_refresh(true);
                tracing::info!(
                    region = %status.region,
                    open_at = ?status.open_at,
                    close_at = ?status.close_at,
                    current_status = status.current_status.as_str(),
                    "Market status refreshed"
                );
            }
            Err(e) => {
                metrics::record_market_refresh(false);
                tracing::warn!(
                    region = %self.config.region,
                    error = %e,
                    "Market status refresh failed, keeping previous status"
                );
            }
        }

        result
    }

    async fn fetch(&self) -> Result<MarketStatus, MarketStatusError> {
        let markets = self.calendar.fetch_markets().await?;

        let record = markets
            .iter()
            .find(|m| m.region == self.config.region)
            .ok_or_else(|| MarketStatusError::MarketNotFound {
                region: self.config.region.clone(),
            })?;

        Ok(MarketStatus::from_record(
            record,
            self.config.timezone,
            self.clock.now(),
        )?)
    }

    /// Whether the market is open right now.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open_at(self.clock.now())
    }

    /// Whether the market is open at `now`. False without a cached status.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status
            .read()
            .as_ref()
            .is_some_and(|status| status.is_open_at(now))
    }

    /// The cached status, or `None` if none has been fetched.
    #[must_use]
    pub fn get_status(&self) -> Option<MarketStatus> {
        self.status.read().clone()
    }

    /// The cached status with `current_status` recomputed at the current time.
    #[must_use]
    pub fn current_status(&self) -> Option<MarketStatus> {
        let now = self.clock.now();
        self.status
            .read()
            .as_ref()
            .map(|status| status.evaluated_at(now))
    }

    /// Whether a status has ever been cached.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status.read().is_some()
    }
}

impl std::fmt::Debug for MarketStatusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketStatusService")
            .field("config", &self.config)
            .field("status", &*self.status.read())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ManualClock, MockMarketCalendarPort};
    use crate::domain::market::{MarketRecord, MarketState};
    use crate::error::UpstreamError;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn record(region: &str, open: &str, close: &str) -> MarketRecord {
        MarketRecord {
            market_type: "Equity".to_string(),
            region: region.to_string(),
            primary_exchanges: "NASDAQ, NYSE".to_string(),
            local_open: open.to_string(),
            local_close: close.to_string(),
            current_status: "closed".to_string(),
            notes: String::new(),
        }
    }

    fn ny(h: u32, m: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(2026, 6, 15, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn service_with(
        calendar: MockMarketCalendarPort,
        clock: Arc<ManualClock>,
    ) -> MarketStatusService {
        MarketStatusService::new(Arc::new(calendar), clock, MarketStatusConfig::default())
    }

    #[tokio::test]
    async fn refresh_then_open_during_session() {
        let mut calendar = MockMarketCalendarPort::new();
        calendar.expect_fetch_markets().returning(|| {
            Ok(vec![
                record("Japan", "09:00", "15:00"),
                record("United States", "09:30", "16:00"),
            ])
        });
        let clock = Arc::new(ManualClock::new(ny(8, 0)));
        let service = service_with(calendar, Arc::clone(&clock));

        let status = service.refresh().await.unwrap();
        assert_eq!(status.region, "United States");

        clock.set(ny(10, 0));
        assert!(service.is_open());

        clock.set(ny(17, 0));
        assert!(!service.is_open());
    }

    #[tokio::test]
    async fn closed_before_any_refresh() {
        let calendar = MockMarketCalendarPort::new();
        let clock = Arc::new(ManualClock::new(ny(10, 0)));
        let service = service_with(calendar, clock);

        assert!(!service.is_open());
        assert!(service.get_status().is_none());
        assert!(service.current_status().is_none());
    }

    #[tokio::test]
    async fn upstream_failure_keeps_previous_status() {
        let mut calendar = MockMarketCalendarPort::new();
        let mut seq = mockall::Sequence::new();
        calendar
            .expect_fetch_markets()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![record("United States", "09:30", "16:00")]));
        calendar
            .expect_fetch_markets()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(UpstreamError::Network("timeout".to_string())));

        let clock = Arc::new(ManualClock::new(ny(10, 0)));
        let service = service_with(calendar, clock);

        let first = service.refresh().await.unwrap();
        let err = service.refresh().await.unwrap_err();

        assert!(matches!(err, MarketStatusError::Upstream(_)));
        assert_eq!(service.get_status(), Some(first));
        assert!(service.is_open());
    }

    #[tokio::test]
    async fn missing_region_is_reported() {
        let mut calendar = MockMarketCalendarPort::new();
        calendar
            .expect_fetch_markets()
            .returning(|| Ok(vec![record("Japan", "09:00", "15:00")]));
        let service = service_with(calendar, Arc::new(ManualClock::new(ny(10, 0))));

        let err = service.refresh().await.unwrap_err();

        assert_eq!(
            err,
            MarketStatusError::MarketNotFound {
                region: "United States".to_string()
            }
        );
        assert!(!service.is_available());
    }

    #[tokio::test]
    async fn malformed_time_keeps_previous_status() {
        let mut calendar = MockMarketCalendarPort::new();
        let mut seq = mockall::Sequence::new();
        calendar
            .expect_fetch_markets()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![record("United States", "09:30", "16:00")]));
        calendar
            .expect_fetch_markets()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![record("United States", "9h30", "16:00")]));
        let service = service_with(calendar, Arc::new(ManualClock::new(ny(10, 0))));

        service.refresh().await.unwrap();
        let err = service.refresh().await.unwrap_err();

        assert!(matches!(err, MarketStatusError::InvalidSchedule(_)));
        assert!(service.is_open());
    }

    #[tokio::test]
    async fn current_status_is_recomputed_live() {
        let mut calendar = MockMarketCalendarPort::new();
        calendar
            .expect_fetch_markets()
            .returning(|| Ok(vec![record("United States", "09:30", "16:00")]));
        let clock = Arc::new(ManualClock::new(ny(8, 0)));
        let service = service_with(calendar, Arc::clone(&clock));

        let fetched = service.refresh().await.unwrap();
        assert_eq!(fetched.current_status, MarketState::Closed);

        clock.set(ny(11, 0));
        let live = service.current_status().unwrap();
        assert_eq!(live.current_status, MarketState::Open);
        assert_eq!(service.get_status().unwrap().current_status, MarketState::Closed);
    }
}
