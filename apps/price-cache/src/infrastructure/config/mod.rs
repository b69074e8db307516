//! Configuration Module
//!
//! Configuration loading for the price cache service.

mod settings;

pub use settings::{
    CacheSettings, ConfigError, Credentials, EndpointSettings, MarketSettings, PriceCacheConfig,
    StreamSettings,
};
