//! Error types for the request shaper
//!
//! Provides unified error handling using thiserror.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Resource Kind ==
/// Kind of object an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Key,
    Layer,
    Strategy,
    Batch,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Key => "key",
            ResourceKind::Layer => "layer",
            ResourceKind::Strategy => "strategy",
            ResourceKind::Batch => "batch",
        };
        f.write_str(name)
    }
}

// == Shaping Error Enum ==
/// Unified error type for the request shaper.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapingError {
    /// Unknown layer, strategy, batch or cache key
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// A configuration value failed a precondition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifier was denied by the rate limiter
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The upstream behind a read-through fetch failed or answered non-2xx
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShapingError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        ShapingError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ShapingError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShapingError::NotFound { .. } => StatusCode::NOT_FOUND,
            ShapingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ShapingError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ShapingError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ShapingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the request shaper.
pub type Result<T> = std::result::Result<T, ShapingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ShapingError::not_found(ResourceKind::Layer, "abc");
        assert_eq!(err.to_string(), "layer not found: abc");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ShapingError::not_found(ResourceKind::Batch, "b"),
                StatusCode::NOT_FOUND,
            ),
            (
                ShapingError::InvalidArgument("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ShapingError::RateLimited("ip".into()),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ShapingError::Upstream("origin down".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ShapingError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
