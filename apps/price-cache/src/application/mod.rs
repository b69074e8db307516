//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the services that resolve price requests and keep
//! the market schedule fresh, and the port interfaces they use to reach
//! the streaming feed and the REST providers.

/// Port interfaces for external systems (stream feed, quote, calendar, clock).
pub mod ports;

/// Application services for price resolution, market status and scheduling.
pub mod services;
