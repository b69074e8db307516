//! Market Calendar Port (Driven Port)
//!
//! Interface for fetching the list of markets and their session times.

use async_trait::async_trait;

use crate::domain::market::MarketRecord;
use crate::error::UpstreamError;

/// Port for the market-calendar provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketCalendarPort: Send + Sync {
    /// Fetch every market the provider knows about.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unreachable or the response is
    /// unusable.
    async fn fetch_markets(&self) -> Result<Vec<MarketRecord>, UpstreamError>;
}
