//! Finnhub Quote Adapter
//!
//! Implements `QuotePort` over Finnhub's `GET /quote` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::messages::QuoteResponse;
use crate::application::ports::{Quote, QuotePort};
use crate::error::UpstreamError;

/// REST quote client.
#[derive(Debug, Clone)]
pub struct FinnhubQuoteClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinnhubQuoteClient {
    /// Create a client against `base_url` (e.g. `https://finnhub.io/api/v1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl QuotePort for FinnhubQuoteClient {
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, UpstreamError> {
        let url = format!("{}/quote", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", ticker), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.without_url().to_string()))?;

        if quote.is_empty() {
            return Err(UpstreamError::NoData(ticker.to_string()));
        }

        let timestamp = DateTime::from_timestamp(quote.timestamp, 0).unwrap_or_else(Utc::now);

        Ok(Quote {
            price: quote.current,
            timestamp,
        })
    }
}
