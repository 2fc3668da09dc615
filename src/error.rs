//! Request-boundary error type.
//!
//! The QA engine itself never fails (it degrades to a fallback
//! answer), so the only errors that cross the HTTP boundary are
//! request-level: rate limiting and malformed input.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AskError {
    #[error("rate limit exceeded, try again later")]
    RateLimited,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        let status = match &self {
            AskError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AskError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_maps_to_429() {
        let response = AskError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = AskError::InvalidRequest("empty question".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
