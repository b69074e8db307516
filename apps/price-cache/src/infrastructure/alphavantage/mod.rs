//! Alpha Vantage Market Calendar Adapter
//!
//! Implements `MarketCalendarPort` over the `MARKET_STATUS` function.
//!
//! # Response
//!
//! ```json
//! {"endpoint": "Global Market Open & Close Status",
//!  "markets": [{"market_type": "Equity", "region": "United States",
//!               "primary_exchanges": "NASDAQ, NYSE, AMEX, BATS",
//!               "local_open": "09:30", "local_close": "16:15",
//!               "current_status": "open", "notes": ""}]}
//! ```
//!
//! Throttled or rejected requests come back as 200 with an `Information`,
//! `Note` or `Error Message` field instead of `markets`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::MarketCalendarPort;
use crate::domain::market::MarketRecord;
use crate::error::UpstreamError;

#[derive(Debug, Deserialize)]
struct MarketStatusResponse {
    #[serde(default)]
    markets: Option<Vec<MarketRecord>>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

/// REST market calendar client.
#[derive(Debug, Clone)]
pub struct AlphaVantageCalendarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageCalendarClient {
    /// Create a client against `base_url` (e.g. `https://www.alphavantage.co`).
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
impl MarketCalendarPort for AlphaVantageCalendarClient {
    async fn fetch_markets(&self) -> Result<Vec<MarketRecord>, UpstreamError> {
        let url = format!("{}/query", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("function", "MARKET_STATUS"), ("apikey", self.api_key.as_str())])
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

        let body: MarketStatusResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.without_url().to_string()))?;

        match body.markets {
            Some(markets) => {
                tracing::debug!(markets = markets.len(), "Fetched market calendar");
                Ok(markets)
            }
            None => Err(UpstreamError::NoData(
                body.error_message
                    .or(body.information)
                    .or(body.note)
                    .unwrap_or_else(|| "response has no markets".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> AlphaVantageCalendarClient {
        AlphaVantageCalendarClient::new(server.uri(), "av-key", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn parses_markets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "MARKET_STATUS"))
            .and(query_param("apikey", "av-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoint": "Global Market Open & Close Status",
                "markets": [
                    {
                        "market_type": "Equity",
                        "region": "United States",
                        "primary_exchanges": "NASDAQ, NYSE, AMEX, BATS",
                        "local_open": "09:30",
                        "local_close": "16:15",
                        "current_status": "closed",
                        "notes": ""
                    },
                    {
                        "market_type": "Equity",
                        "region": "Japan",
                        "primary_exchanges": "Tokyo",
                        "local_open": "09:00",
                        "local_close": "15:00",
                        "current_status": "open",
                        "notes": ""
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let markets = client_for(&server).await.fetch_markets().await.unwrap();

        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].region, "United States");
        assert_eq!(markets[0].local_close, "16:15");
    }

    #[tokio::test]
    async fn rate_limit_note_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Information": "Thank you for using Alpha Vantage! Please consider..."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_markets().await.unwrap_err();

        assert!(matches!(err, UpstreamError::NoData(msg) if msg.starts_with("Thank you")));
    }

    #[tokio::test]
    async fn server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_markets().await.unwrap_err();

        assert!(matches!(err, UpstreamError::Status { code: 503, .. }));
    }
}
