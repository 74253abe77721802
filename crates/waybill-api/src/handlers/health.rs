//! Health check handlers for service monitoring.
//!
//! Provides liveness, readiness, and health endpoints with order store
//! connectivity checks for orchestration systems like Kubernetes.

use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};
use waybill_core::OrderTrackingStore;

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Critical systems failing
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Order store connectivity
    pub store: ComponentHealth,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

/// Checks the order store and reports overall status.
pub async fn check_health(store: &dyn OrderTrackingStore) -> HealthResponse {
    debug!("Performing health check");

    let timestamp = Utc::now();
    let start_time = Instant::now();

    let (status, message) = match store.health_check().await {
        Ok(()) => (ComponentStatus::Up, None),
        Err(e) => {
            error!("Order store health check failed: {}", e);
            (ComponentStatus::Down, Some(format!("Order store unavailable: {e}")))
        },
    };
    let elapsed = start_time.elapsed();

    let overall_status = match status {
        ComponentStatus::Up => HealthStatus::Healthy,
        ComponentStatus::Down => HealthStatus::Unhealthy,
    };

    HealthResponse {
        status: overall_status,
        timestamp,
        checks: HealthChecks {
            store: ComponentHealth {
                status,
                message,
                response_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            },
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Health check endpoint handler.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let response = check_health(state.store().as_ref()).await;

    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// Readiness check endpoint for Kubernetes probes.
#[instrument(name = "readiness_check", skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    health_check(State(state)).await
}

/// Liveness check endpoint for Kubernetes probes.
///
/// Does not touch the order store.
#[instrument(name = "liveness_check")]
pub async fn liveness_check() -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now(),
        "service": "waybill-api"
    });

    (StatusCode::OK, Json(response)).into_response()
}
