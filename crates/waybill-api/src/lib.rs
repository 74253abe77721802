//! Waybill HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{sync::Arc, time::Duration};

use waybill_core::{CarrierResolver, Ingestor, OrderTrackingStore};

pub mod config;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use server::{create_router, start_server};

/// Request limits applied by the router.
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    /// Maximum time a request may take.
    pub request_timeout: Duration,
    /// Maximum accepted request body in bytes.
    pub max_payload_bytes: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(30), max_payload_bytes: 10 * 1024 * 1024 }
    }
}

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Webhook ingestion pipeline.
    pub ingestor: Ingestor,
    /// Router limits.
    pub limits: ServerLimits,
}

impl AppState {
    /// Creates state with default limits.
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor, limits: ServerLimits::default() }
    }

    /// Replaces the router limits.
    pub fn with_limits(mut self, limits: ServerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Order store behind the ingestor.
    pub fn store(&self) -> &Arc<dyn OrderTrackingStore> {
        self.ingestor.store()
    }

    /// Carrier table used for display.
    pub fn carriers(&self) -> &CarrierResolver {
        self.ingestor.carriers()
    }
}
