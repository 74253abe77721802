//! Error types and result handling for tracking ingestion.
//!
//! `CoreError` covers storage failures. `TrackingError` is the per-request
//! taxonomy the ingestor reports, with codes for log correlation and a short
//! reason that ends up in the acknowledgement body.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::InvalidInput(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Failure classes of a single tracking update.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Body is not JSON or has no `data` object (E1001).
    #[error("[E1001] Malformed payload: {detail}")]
    MalformedPayload {
        /// Parser detail for diagnostics
        detail: String,
    },

    /// One of `metadata`, `tracking_number`, `tracking_url_provider` is
    /// absent or empty (E1002).
    #[error("[E1002] Missing fields: {}", missing.join(", "))]
    MissingFields {
        /// Names of the absent fields
        missing: Vec<&'static str>,
    },

    /// Metadata carries no usable order number (E1003).
    #[error("[E1003] Unresolvable order reference: {metadata:?}")]
    UnresolvableOrderReference {
        /// The metadata string as received
        metadata: String,
    },

    /// No order exists for the extracted id (E1004).
    #[error("[E1004] Order not found: order {order_id} from {metadata:?}")]
    OrderNotFound {
        /// Extracted order id
        order_id: u64,
        /// The metadata string as received
        metadata: String,
    },

    /// Tracking number or URL was empty or invalid after sanitizing (E1005).
    #[error(
        "[E1005] Sanitization failed: tracking number ({tracking_number:?}) or url \
         ({tracking_url:?}) rejected"
    )]
    SanitizationFailed {
        /// Tracking number as received
        tracking_number: String,
        /// Tracking URL as received
        tracking_url: String,
    },

    /// The order store could not be read or written (E3001).
    #[error("[E3001] Store write failed: {0}")]
    StoreWriteFailed(#[from] CoreError),
}

impl TrackingError {
    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "E1001",
            Self::MissingFields { .. } => "E1002",
            Self::UnresolvableOrderReference { .. } => "E1003",
            Self::OrderNotFound { .. } => "E1004",
            Self::SanitizationFailed { .. } => "E1005",
            Self::StoreWriteFailed(_) => "E3001",
        }
    }

    /// Short human-readable reason used in the acknowledgement body.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "malformed payload",
            Self::MissingFields { .. } => "missing fields",
            Self::UnresolvableOrderReference { .. } | Self::OrderNotFound { .. } => {
                "invalid order"
            },
            Self::SanitizationFailed { .. } => "tracking number or url failed sanitization",
            Self::StoreWriteFailed(_) => "could not store tracking info",
        }
    }

    /// Whether the provider should redeliver. Input problems never are.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreWriteFailed(_))
    }
}
