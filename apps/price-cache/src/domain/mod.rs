//! Domain Layer - Core price cache types and business rules.
//!
//! This layer contains the in-memory state of the cache (prices,
//! subscription records, market schedule) with no I/O. All types here are
//! pure Rust with serialization support.

/// Market schedule types and local-time anchoring.
pub mod market;

/// Cached prices and the shared price store.
pub mod price;

/// Per-ticker access tracking and idle expiry.
pub mod subscription;
