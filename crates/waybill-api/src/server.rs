//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Body size limit
//! 5. Handler execution

use std::net::SocketAddr;

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{handlers, AppState};

/// Current webhook path.
pub const TRACKING_WEBHOOK_PATH: &str = "/tracking/v1/transaction-updated";

/// Path the provider was originally configured with.
pub const LEGACY_WEBHOOK_PATH: &str = "/shippo/v1/transaction-updated";

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use waybill_api::{create_router, AppState};
/// use waybill_core::{
///     CarrierResolver, InMemoryOrderStore, IngestPolicy, Ingestor, NoOpDiagnosticSink,
/// };
///
/// let ingestor = Ingestor::new(
///     Arc::new(InMemoryOrderStore::new()),
///     CarrierResolver::default(),
///     Arc::new(NoOpDiagnosticSink::new()),
///     IngestPolicy::default(),
/// );
/// let app = create_router(AppState::new(ingestor));
/// ```
pub fn create_router(state: AppState) -> Router {
    let limits = state.limits;

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check));

    let tracking_routes = Router::new()
        .route(TRACKING_WEBHOOK_PATH, post(handlers::receive_tracking_update))
        .route(LEGACY_WEBHOOK_PATH, post(handlers::receive_tracking_update))
        .route("/tracking/v1/orders/{order_id}", get(handlers::get_order_tracking));

    Router::new()
        .merge(health_routes)
        .merge(tracking_routes)
        .layer(DefaultBodyLimit::max(limits.max_payload_bytes))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
