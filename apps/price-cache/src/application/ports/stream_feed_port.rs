//! Stream Feed Port (Driven Port)
//!
//! Interface to the single persistent streaming connection. Calls never
//! block on I/O: control messages are handed to the connection task and
//! prices are read from the shared cache.

use serde::Serialize;

use crate::domain::price::PriceEntry;

/// What happened to a subscribe or unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Handed to the open connection.
    Sent,
    /// No connection was open; the request was dropped.
    NotConnected,
}

impl SubscribeOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::NotConnected => "not_connected",
        }
    }
}

/// Point-in-time copy of the connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    /// Whether the connection is open.
    pub connected: bool,
    /// Inbound frames of any kind.
    pub frames_received: u64,
    /// Price entries written.
    pub prices_updated: u64,
    /// Frames discarded as malformed.
    pub malformed_frames: u64,
    /// Reconnection attempts since start.
    pub reconnect_attempts: u64,
    /// Symbols restored on reconnect.
    pub subscribed_symbols: usize,
}

/// Port for the streaming market-data connection.
#[cfg_attr(test, mockall::automock)]
pub trait StreamFeedPort: Send + Sync {
    /// Ask the provider to start streaming trades for a ticker.
    fn subscribe(&self, ticker: &str) -> SubscribeOutcome;

    /// Ask the provider to stop streaming trades for a ticker.
    fn unsubscribe(&self, ticker: &str) -> SubscribeOutcome;

    /// Last cached price for a ticker, if any.
    fn price(&self, ticker: &str) -> Option<PriceEntry>;

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;

    /// Connection counters for health reporting.
    fn stats(&self) -> StreamStatsSnapshot;
}
