//! HTTP request handlers for the waybill API.
//!
//! - `tracking` - carrier webhook ingestion
//! - `orders` - customer-facing tracking view
//! - `health` - health check and readiness probes
//!
//! The webhook endpoint answers in plain text, as carriers expect; the read
//! endpoints answer JSON with `{ "error": { "code", "message" } }` on failure.

pub mod health;
pub mod orders;
pub mod tracking;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub use health::{health_check, liveness_check, readiness_check};
pub use orders::get_order_tracking;
pub use tracking::receive_tracking_update;

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Creates a standardized JSON error response.
pub(crate) fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse { error: ErrorDetail { code: code.to_string(), message: message.into() } };
    (status, Json(body)).into_response()
}
