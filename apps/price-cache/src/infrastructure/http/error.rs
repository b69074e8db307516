//! Mapping from [`CacheError`] to HTTP responses.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::error::CacheError;

/// JSON error body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: String,
}

/// A [`CacheError`] rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(pub CacheError);

impl ApiError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self(CacheError::Validation(message.into()))
    }

    /// Status code for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.0 {
            CacheError::Validation(_) => StatusCode::BAD_REQUEST,
            CacheError::NotYetInitialized => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            CacheError::MalformedMessage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(error: CacheError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(CacheError::Validation("x".into()), StatusCode::BAD_REQUEST ; "validation")]
    #[test_case(CacheError::NotYetInitialized, StatusCode::SERVICE_UNAVAILABLE ; "not initialized")]
    #[test_case(CacheError::UpstreamUnavailable("x".into()), StatusCode::BAD_GATEWAY ; "upstream")]
    #[test_case(CacheError::MalformedMessage("x".into()), StatusCode::INTERNAL_SERVER_ERROR ; "malformed")]
    fn maps_status(error: CacheError, expected: StatusCode) {
        assert_eq!(ApiError(error).status(), expected);
    }

    #[test]
    fn not_initialized_body() {
        let body = ErrorBody {
            message: CacheError::NotYetInitialized.to_string(),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"message": "Market status not available"})
        );
    }
}
