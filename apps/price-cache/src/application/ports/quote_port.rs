//! Quote Port (Driven Port)
//!
//! Interface for one-shot current-price lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::UpstreamError;

/// Current price as reported by the quote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Current price.
    pub price: Decimal,
    /// When the provider last updated it.
    pub timestamp: DateTime<Utc>,
}

/// Port for the REST quote provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotePort: Send + Sync {
    /// Fetch the current price for a ticker.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, an
    /// undecodable body, or when the provider has no data for the ticker.
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, UpstreamError>;
}
