//! Diagnostic records for every webhook call and the sinks that receive them.
//!
//! The ingestor hands each record to a `DiagnosticSink` on a detached task,
//! so a slow or failing sink never delays the acknowledgement. Sinks log
//! their own failures and never propagate them.
//!
//! ```text
//! ┌──────────┐  DiagnosticRecord  ┌──────────────────┐
//! │ Ingestor │ ──── spawn ───────▶│ MulticastSink    │
//! └──────────┘                    └──────────────────┘
//!                                   │            │
//!                                   ▼            ▼
//!                            TracingSink    HttpSink ──▶ ops endpoint
//! ```

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything captured about one webhook call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// Unique ID for this record.
    pub id: Uuid,

    /// When the request was received.
    pub received_at: DateTime<Utc>,

    /// Request headers as received.
    pub headers: HashMap<String, String>,

    /// Raw request body, lossily decoded as UTF-8.
    pub body: String,

    /// `persisted` or the failure code (`E1001`..`E3001`).
    pub outcome: String,

    /// Human-readable description of the outcome.
    pub message: String,

    /// Order the update resolved to, if it got that far.
    pub order_id: Option<u64>,
}

impl DiagnosticRecord {
    /// Whether the update was stored.
    pub fn is_success(&self) -> bool {
        self.outcome == "persisted"
    }
}

/// Receiver of diagnostic records.
#[async_trait::async_trait]
pub trait DiagnosticSink: Send + Sync + std::fmt::Debug {
    /// Handles a record. Must not panic; failures are logged and dropped.
    async fn emit(&self, record: DiagnosticRecord);
}

/// Sink that discards all records.
#[derive(Debug, Default)]
pub struct NoOpDiagnosticSink;

impl NoOpDiagnosticSink {
    /// Creates a new no-op sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl DiagnosticSink for NoOpDiagnosticSink {
    async fn emit(&self, _record: DiagnosticRecord) {}
}

/// Sink that writes records to the tracing log.
///
/// Headers and body go out at `debug`, the outcome at `info` or `warn`.
#[derive(Debug, Default)]
pub struct TracingDiagnosticSink;

impl TracingDiagnosticSink {
    /// Creates a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl DiagnosticSink for TracingDiagnosticSink {
    async fn emit(&self, record: DiagnosticRecord) {
        debug!(
            diagnostic_id = %record.id,
            headers = ?record.headers,
            body = %record.body,
            "Tracking webhook payload"
        );

        if record.is_success() {
            info!(
                diagnostic_id = %record.id,
                order_id = ?record.order_id,
                "{}", record.message
            );
        } else {
            warn!(
                diagnostic_id = %record.id,
                outcome = %record.outcome,
                order_id = ?record.order_id,
                "{}", record.message
            );
        }
    }
}

/// Sink that forwards records as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpDiagnosticSink {
    client: reqwest::Client,
    url: String,
}

impl HttpDiagnosticSink {
    /// Creates a sink posting to `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("waybill-diagnostics/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, url: url.into() })
    }

    /// Destination URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl DiagnosticSink for HttpDiagnosticSink {
    async fn emit(&self, record: DiagnosticRecord) {
        let diagnostic_id = record.id;
        match self.client.post(&self.url).json(&record).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%diagnostic_id, status = %response.status(), "Diagnostic forwarded");
            },
            Ok(response) => {
                warn!(%diagnostic_id, status = %response.status(), "Diagnostic endpoint rejected record");
            },
            Err(e) => {
                warn!(%diagnostic_id, error = %e, "Failed to forward diagnostic");
            },
        }
    }
}

/// Sink that forwards records to several subscribers concurrently.
#[derive(Debug, Clone, Default)]
pub struct MulticastDiagnosticSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl MulticastDiagnosticSink {
    /// Creates a multicast sink with no subscribers.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Adds a subscriber.
    pub fn add_subscriber(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sinks.push(sink);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }
}

#[async_trait::async_trait]
impl DiagnosticSink for MulticastDiagnosticSink {
    async fn emit(&self, record: DiagnosticRecord) {
        let futures = self.sinks.iter().map(|sink| {
            let record = record.clone();
            async move { sink.emit(record).await }
        });

        futures::future::join_all(futures).await;
    }
}
