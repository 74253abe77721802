//! Order store abstraction the ingestor writes through.
//!
//! The shop platform owns orders; this service only reads them and updates
//! their two tracking fields. `OrderTrackingStore` is the seam: production
//! uses the PostgreSQL repository, tests and local runs use the in-memory
//! store.

use std::{future::Future, pin::Pin};

use crate::{
    error::Result,
    models::{Order, OrderId, TrackingField, TrackingRecord},
};

pub mod memory;
pub mod postgres;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Storage operations required for tracking ingestion.
///
/// Implementations must make `set_tracking` atomic: a concurrent reader sees
/// either both old values or both new values.
pub trait OrderTrackingStore: Send + Sync + 'static {
    /// Finds an order with its line items and tracking record.
    fn find_order(&self, order_id: OrderId) -> StoreFuture<'_, Option<Order>>;

    /// Reads a single tracking field of an order.
    ///
    /// Returns `None` when the order does not exist or the field is unset.
    fn tracking_field(
        &self,
        order_id: OrderId,
        field: TrackingField,
    ) -> StoreFuture<'_, Option<String>>;

    /// Overwrites both tracking fields of an order in one write.
    ///
    /// Fails with `CoreError::NotFound` if the order does not exist.
    fn set_tracking(&self, order_id: OrderId, record: TrackingRecord) -> StoreFuture<'_, ()>;

    /// Verifies the store is reachable.
    fn health_check(&self) -> StoreFuture<'_, ()>;
}

impl std::fmt::Debug for dyn OrderTrackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn OrderTrackingStore")
    }
}
