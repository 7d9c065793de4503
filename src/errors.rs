//! Error types for quakescope.
//!
//! Uses `thiserror` for library-style error definitions. Handler errors
//! render as a JSON body via [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that can occur while talking to the feed or decoding its events.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// API returned an error status
    #[error("USGS API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Event validation failed
    #[error("Invalid event data: {0}")]
    Validation(String),

    /// The blocking fetch task panicked or was cancelled
    #[error("Feed task failed: {0}")]
    Task(String),
}

/// Errors returned by the dashboard's HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body or parameter was not acceptable
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// The operation needs loaded data and none is usable right now
    /// (nothing loaded yet, or a reload is in flight)
    #[error("no data available")]
    NoData,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NoData => StatusCode::CONFLICT,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
