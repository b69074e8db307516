//! Error Types
//!
//! Error taxonomy shared across layers. Provider adapters return
//! [`UpstreamError`]; the market status service wraps it in
//! [`MarketStatusError`]; the stream codec returns [`FrameError`], which the
//! stream client reports as [`CacheError::MalformedMessage`]. The
//! orchestrator surfaces [`CacheError`] to callers, which the HTTP layer maps
//! to status codes.

use crate::domain::market::ScheduleError;

/// Failure talking to an external provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Transport failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("provider returned {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Provider answered but had no data for the request.
    #[error("no data for {0}")]
    NoData(String),
}

/// Failure refreshing the market schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketStatusError {
    /// Calendar provider failed.
    #[error("calendar provider unavailable: {0}")]
    Upstream(#[from] UpstreamError),

    /// The provider did not list the configured region.
    #[error("market not found for region {region:?}")]
    MarketNotFound {
        /// The configured region.
        region: String,
    },

    /// The provider's open/close time could not be used.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),
}

/// Unusable inbound stream frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Not valid JSON, or missing required fields.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Well-formed, but of a type this client does not handle.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
}

/// Outcome taxonomy surfaced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// A provider fetch failed; cached state is unchanged.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A stream frame could not be parsed and was discarded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The request had the wrong shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// No market status has been fetched yet.
    #[error("Market status not available")]
    NotYetInitialized,
}

impl From<UpstreamError> for CacheError {
    fn from(err: UpstreamError) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}

impl From<FrameError> for CacheError {
    fn from(err: FrameError) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}
