//! Stream Codec
//!
//! JSON encoding of control messages and decoding of inbound frames.

use std::collections::HashMap;

use chrono::DateTime;

use super::messages::{
    ControlKind, ControlMessage, Envelope, ErrorFrame, InboundFrame, TradeFrame, TradeTick,
};
use crate::domain::price::{PriceEntry, PriceSource};
use crate::error::FrameError;

/// JSON codec for the Finnhub trade stream.
#[derive(Debug, Default, Clone)]
pub struct FinnhubCodec;

impl FinnhubCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a control message.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_control(&self, kind: ControlKind, symbol: &str) -> serde_json::Result<String> {
        serde_json::to_string(&ControlMessage { kind, symbol })
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` for invalid JSON or a body that does not match its
    /// declared type, and `UnknownType` for an unrecognised `type`.
    pub fn decode(&self, text: &str) -> Result<InboundFrame, FrameError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;

        match envelope.kind.as_str() {
            "trade" => {
                let frame: TradeFrame =
                    serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
                Ok(InboundFrame::Trade(frame.data))
            }
            "ping" => Ok(InboundFrame::Ping),
            "error" => {
                let frame: ErrorFrame =
                    serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
                Ok(InboundFrame::Error(frame.msg))
            }
            other => Err(FrameError::UnknownType(other.to_string())),
        }
    }
}

/// Reduce a batch of trades to the latest price per symbol.
///
/// The trade with the greatest timestamp wins; on equal timestamps the one
/// later in the batch wins.
///
/// # Errors
///
/// Returns `Malformed` if a timestamp is out of range.
pub fn latest_prices(ticks: &[TradeTick]) -> Result<Vec<PriceEntry>, FrameError> {
    let mut latest: HashMap<&str, &TradeTick> = HashMap::new();

    for tick in ticks {
        match latest.get(tick.symbol.as_str()) {
            Some(current) if current.timestamp_ms > tick.timestamp_ms => {}
            _ => {
                latest.insert(tick.symbol.as_str(), tick);
            }
        }
    }

    let mut entries = latest
        .into_values()
        .map(|tick| {
            let at = DateTime::from_timestamp_millis(tick.timestamp_ms).ok_or_else(|| {
                FrameError::Malformed(format!("timestamp out of range: {}", tick.timestamp_ms))
            })?;
            Ok(PriceEntry::new(
                tick.symbol.clone(),
                tick.price,
                at,
                PriceSource::Stream,
            ))
        })
        .collect::<Result<Vec<_>, FrameError>>()?;

    entries.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(entries)
}
