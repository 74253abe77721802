//! Core domain models and ingestion logic for shipment tracking updates.
//!
//! Provides strongly-typed order and tracking primitives, the carrier
//! resolver, the shippability classifier, the webhook ingestor and the
//! storage abstraction it writes through. The HTTP layer and the binary
//! depend on these types and never talk to storage directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod carrier;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod models;
pub mod notice;
pub mod sanitize;
pub mod shipping;
pub mod storage;

pub use carrier::{CarrierResolver, CarrierRule};
pub use diagnostics::{
    DiagnosticRecord, DiagnosticSink, HttpDiagnosticSink, MulticastDiagnosticSink,
    NoOpDiagnosticSink, TracingDiagnosticSink,
};
pub use error::{CoreError, Result, TrackingError};
pub use ingest::{Acknowledgement, IngestOutcome, IngestPolicy, Ingestor};
pub use models::{LineItem, Order, OrderId, TrackingField, TrackingRecord};
pub use notice::TrackingNotice;
pub use shipping::is_shippable;
pub use storage::{memory::InMemoryOrderStore, postgres::PostgresOrderStore, OrderTrackingStore};
