//! Tracking webhook ingestion.
//!
//! Each call runs the same pipeline with no state shared between requests:
//!
//! ```text
//! Received → Parsed → Validated → OrderResolved → Sanitized → Persisted
//!     └─────────┴──────────┴─────────────┴────────────┴──▶ Failed(reason)
//! ```
//!
//! The provider redelivers on non-2xx answers, so input problems are
//! acknowledged with `200` by default (`IngestPolicy::always_acknowledge`).
//! Store failures are the exception: they always answer `500`, because the
//! update was valid and dropping it would lose data.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    carrier::CarrierResolver,
    diagnostics::{DiagnosticRecord, DiagnosticSink},
    error::TrackingError,
    models::{OrderId, TrackingRecord},
    sanitize::{extract_order_id, sanitize_tracking_number, sanitize_tracking_url},
    storage::OrderTrackingStore,
};

/// Body returned when tracking info was stored.
pub const ACK_OK: &str = "ok - tracking info added.";

/// The three fields a transaction update must carry inside `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdate {
    /// Free text carrying the order number, e.g. `"Order 1234"`.
    pub metadata: String,
    /// Tracking number as sent by the provider.
    pub tracking_number: String,
    /// Carrier tracking page URL as sent by the provider.
    pub tracking_url_provider: String,
}

impl TransactionUpdate {
    /// Parses a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` if the body is not JSON or has no `data`
    /// object, and `MissingFields` if any required field is absent, not a
    /// string, or empty.
    pub fn parse(raw_body: &[u8]) -> Result<Self, TrackingError> {
        let value: Value = serde_json::from_slice(raw_body)
            .map_err(|e| TrackingError::MalformedPayload { detail: e.to_string() })?;

        let data = value.get("data").and_then(Value::as_object).ok_or_else(|| {
            TrackingError::MalformedPayload { detail: "missing `data` object".to_string() }
        })?;

        let metadata = required_field(data, "metadata");
        let tracking_number = required_field(data, "tracking_number");
        let tracking_url_provider = required_field(data, "tracking_url_provider");

        match (metadata, tracking_number, tracking_url_provider) {
            (Some(metadata), Some(tracking_number), Some(tracking_url_provider)) => Ok(Self {
                metadata: metadata.to_string(),
                tracking_number: tracking_number.to_string(),
                tracking_url_provider: tracking_url_provider.to_string(),
            }),
            (metadata, tracking_number, tracking_url_provider) => {
                let missing = [
                    ("metadata", metadata.is_none()),
                    ("tracking_number", tracking_number.is_none()),
                    ("tracking_url_provider", tracking_url_provider.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(TrackingError::MissingFields { missing })
            },
        }
    }
}

fn required_field<'a>(data: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    data.get(name).and_then(Value::as_str).filter(|value| !value.is_empty())
}

/// How failures are reported at the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestPolicy {
    /// Answer `200` for every input failure so the provider does not retry.
    pub always_acknowledge: bool,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self { always_acknowledge: true }
    }
}

/// Terminal state of one ingestion.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Both fields were written to the order.
    Persisted {
        /// Order that was updated
        order_id: OrderId,
        /// Stored tracking number
        tracking_number: String,
        /// Stored tracking URL
        tracking_url: String,
        /// Carrier resolved from the URL, if known
        carrier: Option<String>,
    },
    /// Nothing was written.
    Failed(TrackingError),
}

impl IngestOutcome {
    /// Whether the update was stored.
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    /// Failure classification, if any.
    pub fn error(&self) -> Option<&TrackingError> {
        match self {
            Self::Persisted { .. } => None,
            Self::Failed(e) => Some(e),
        }
    }

    /// Short outcome label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted { .. } => "persisted",
            Self::Failed(e) => e.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Persisted { tracking_number, tracking_url, .. } => {
                format!("Added tracking info: \"{tracking_number}\" and \"{tracking_url}\"")
            },
            Self::Failed(e) => e.to_string(),
        }
    }
}

/// Status and body to answer the provider with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// HTTP status code
    pub status: StatusCode,
    /// Plain-text body
    pub body: String,
}

/// Validates tracking updates and writes them to the order store.
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: Arc<dyn OrderTrackingStore>,
    carriers: Arc<CarrierResolver>,
    diagnostics: Arc<dyn DiagnosticSink>,
    policy: IngestPolicy,
}

impl Ingestor {
    /// Creates an ingestor.
    pub fn new(
        store: Arc<dyn OrderTrackingStore>,
        carriers: CarrierResolver,
        diagnostics: Arc<dyn DiagnosticSink>,
        policy: IngestPolicy,
    ) -> Self {
        Self { store, carriers: Arc::new(carriers), diagnostics, policy }
    }

    /// Order store this ingestor writes to.
    pub fn store(&self) -> &Arc<dyn OrderTrackingStore> {
        &self.store
    }

    /// Carrier table used to label stored URLs.
    pub fn carriers(&self) -> &CarrierResolver {
        &self.carriers
    }

    /// Active acknowledgement policy.
    pub fn policy(&self) -> IngestPolicy {
        self.policy
    }

    /// Runs one tracking update through the pipeline.
    ///
    /// Never fails: every problem ends in `IngestOutcome::Failed`. A
    /// diagnostic record is dispatched in the background for every call.
    #[instrument(name = "ingest_tracking_update", skip_all, fields(body_len = raw_body.len()))]
    pub async fn ingest(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
    ) -> IngestOutcome {
        let received_at = Utc::now();

        let outcome = match self.process(raw_body).await {
            Ok(outcome) => outcome,
            Err(e) => IngestOutcome::Failed(e),
        };

        match &outcome {
            IngestOutcome::Persisted { order_id, carrier, .. } => {
                info!(order_id = %order_id, carrier = ?carrier, "Tracking info added");
            },
            IngestOutcome::Failed(e) if e.is_retryable() => {
                error!(code = e.code(), error = %e, "Tracking update could not be stored");
            },
            IngestOutcome::Failed(e) => {
                warn!(code = e.code(), error = %e, "Tracking update rejected");
            },
        }

        let order_id = match &outcome {
            IngestOutcome::Persisted { order_id, .. } => Some(order_id.0),
            IngestOutcome::Failed(TrackingError::OrderNotFound { order_id, .. }) => Some(*order_id),
            IngestOutcome::Failed(_) => None,
        };

        self.dispatch_diagnostic(DiagnosticRecord {
            id: Uuid::new_v4(),
            received_at,
            headers: headers.clone(),
            body: String::from_utf8_lossy(raw_body).into_owned(),
            outcome: outcome.label().to_string(),
            message: outcome.message(),
            order_id,
        });

        outcome
    }

    async fn process(&self, raw_body: &[u8]) -> Result<IngestOutcome, TrackingError> {
        let update = TransactionUpdate::parse(raw_body)?;
        debug!(metadata = %update.metadata, "Payload validated");

        let order_id = extract_order_id(&update.metadata).ok_or_else(|| {
            TrackingError::UnresolvableOrderReference { metadata: update.metadata.clone() }
        })?;

        if self.store.find_order(order_id).await?.is_none() {
            return Err(TrackingError::OrderNotFound {
                order_id: order_id.0,
                metadata: update.metadata,
            });
        }
        debug!(order_id = %order_id, "Order resolved");

        let sanitized = sanitize_tracking_number(&update.tracking_number)
            .zip(sanitize_tracking_url(&update.tracking_url_provider));
        let Some((tracking_number, tracking_url)) = sanitized else {
            return Err(TrackingError::SanitizationFailed {
                tracking_number: update.tracking_number,
                tracking_url: update.tracking_url_provider,
            });
        };

        let record = TrackingRecord::new(tracking_number.clone(), tracking_url.clone());
        self.store.set_tracking(order_id, record).await?;

        let carrier = self.carriers.resolve(&tracking_url).map(str::to_string);
        Ok(IngestOutcome::Persisted { order_id, tracking_number, tracking_url, carrier })
    }

    fn dispatch_diagnostic(&self, record: DiagnosticRecord) {
        let sink = self.diagnostics.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { sink.emit(record).await });
            },
            Err(_) => {
                warn!(diagnostic_id = %record.id, "No async runtime, diagnostic dropped");
            },
        }
    }

    /// Maps an outcome to the answer sent to the provider.
    pub fn acknowledge(&self, outcome: &IngestOutcome) -> Acknowledgement {
        match outcome {
            IngestOutcome::Persisted { .. } => {
                Acknowledgement { status: StatusCode::OK, body: ACK_OK.to_string() }
            },
            IngestOutcome::Failed(e) => {
                let status = if e.is_retryable() {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else if self.policy.always_acknowledge {
                    StatusCode::OK
                } else {
                    rejection_status(e)
                };
                Acknowledgement { status, body: format!("Failed - {}.", e.reason()) }
            },
        }
    }
}

/// Status for a failure when acknowledgement is not forced.
pub const fn rejection_status(error: &TrackingError) -> StatusCode {
    match error {
        TrackingError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
        TrackingError::MissingFields { .. }
        | TrackingError::UnresolvableOrderReference { .. }
        | TrackingError::SanitizationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TrackingError::OrderNotFound { .. } => StatusCode::NOT_FOUND,
        TrackingError::StoreWriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
