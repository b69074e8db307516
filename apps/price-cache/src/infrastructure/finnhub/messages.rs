//! Finnhub Message Types
//!
//! Wire formats for the Finnhub trade stream and quote endpoint.
//!
//! # Stream Frames
//!
//! ```json
//! {"type":"subscribe","symbol":"AAPL"}
//! {"type":"trade","data":[{"s":"AAPL","p":150.25,"t":1781530200000,"v":100}]}
//! {"type":"ping"}
//! {"type":"error","msg":"Invalid symbol"}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Outbound
// =============================================================================

/// Control message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Start streaming trades for a symbol.
    Subscribe,
    /// Stop streaming trades for a symbol.
    Unsubscribe,
}

/// Control message sent to the stream.
#[derive(Debug, Clone, Serialize)]
pub struct ControlMessage<'a> {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// Target symbol.
    pub symbol: &'a str,
}

// =============================================================================
// Inbound
// =============================================================================

/// Type discriminator read before decoding the body.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
}

/// One trade inside a `trade` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TradeTick {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,
    /// Last price.
    #[serde(rename = "p")]
    pub price: Decimal,
    /// Trade time, unix milliseconds.
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
    /// Volume.
    #[serde(rename = "v", default)]
    pub volume: Option<Decimal>,
}

/// Body of a `trade` frame.
#[derive(Debug, Deserialize)]
pub(crate) struct TradeFrame {
    pub data: Vec<TradeTick>,
}

/// Body of an `error` frame.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorFrame {
    #[serde(default)]
    pub msg: String,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Trades for one or more symbols.
    Trade(Vec<TradeTick>),
    /// Keep-alive.
    Ping,
    /// Provider-reported error.
    Error(String),
}

impl InboundFrame {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Trade(_) => "trade",
            Self::Ping => "ping",
            Self::Error(_) => "error",
        }
    }
}

// =============================================================================
// Quote Endpoint
// =============================================================================

/// `GET /quote` response. Only the fields the cache uses.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    /// Current price.
    #[serde(rename = "c")]
    pub current: Decimal,
    /// Last update, unix seconds.
    #[serde(rename = "t", default)]
    pub timestamp: i64,
}

impl QuoteResponse {
    /// Finnhub answers unknown symbols with an all-zero body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_zero() && self.timestamp == 0
    }
}
