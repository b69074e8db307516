//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamFeedPort`: The persistent streaming connection
//! - `QuotePort`: One-shot REST quotes
//! - `MarketCalendarPort`: Market open/close schedule
//! - `Clock`: Current time

mod clock;
mod market_calendar_port;
mod quote_port;
mod stream_feed_port;

pub use clock::{Clock, ManualClock, SystemClock};
pub use market_calendar_port::MarketCalendarPort;
pub use quote_port::{Quote, QuotePort};
pub use stream_feed_port::{StreamFeedPort, StreamStatsSnapshot, SubscribeOutcome};

#[cfg(test)]
pub use market_calendar_port::MockMarketCalendarPort;
#[cfg(test)]
pub use quote_port::MockQuotePort;
#[cfg(test)]
pub use stream_feed_port::MockStreamFeedPort;
