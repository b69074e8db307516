//! Finnhub Adapters
//!
//! - **Trade stream**: WebSocket client feeding the price store
//! - **Quote**: REST client used for fallback fetches

pub mod codec;
pub mod messages;
pub mod quote;
pub mod reconnect;
pub mod stream;

pub use codec::{FinnhubCodec, latest_prices};
pub use messages::{ControlKind, InboundFrame, TradeTick};
pub use quote::FinnhubQuoteClient;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use stream::{StreamClientConfig, StreamClientError, StreamFeedClient};
