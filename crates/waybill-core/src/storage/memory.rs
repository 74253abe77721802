//! In-memory order store.
//!
//! Holds orders behind a single `RwLock`, so a tracking write replaces both
//! fields under one guard. Supports error injection for failure-path tests.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::{OrderTrackingStore, StoreFuture};
use crate::{
    error::CoreError,
    models::{Order, OrderId, TrackingField, TrackingRecord},
};

/// In-memory implementation of `OrderTrackingStore`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    write_error: Arc<RwLock<Option<String>>>,
    writes: Arc<RwLock<Vec<(OrderId, TrackingRecord)>>>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an order.
    pub async fn insert_order(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    /// Makes every following `set_tracking` call fail with the given message.
    pub async fn fail_writes(&self, message: impl Into<String>) {
        *self.write_error.write().await = Some(message.into());
    }

    /// Returns every successful `set_tracking` call in order.
    pub async fn recorded_writes(&self) -> Vec<(OrderId, TrackingRecord)> {
        self.writes.read().await.clone()
    }

    /// Returns a snapshot of the order.
    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.read().await.get(&order_id).cloned()
    }
}

impl OrderTrackingStore for InMemoryOrderStore {
    fn find_order(&self, order_id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move { Ok(self.orders.read().await.get(&order_id).cloned()) })
    }

    fn tracking_field(
        &self,
        order_id: OrderId,
        field: TrackingField,
    ) -> StoreFuture<'_, Option<String>> {
        Box::pin(async move {
            Ok(self
                .orders
                .read()
                .await
                .get(&order_id)
                .and_then(|order| order.tracking.field(field).map(str::to_string)))
        })
    }

    fn set_tracking(&self, order_id: OrderId, record: TrackingRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if let Some(message) = self.write_error.read().await.clone() {
                return Err(CoreError::Database(message));
            }

            let mut orders = self.orders.write().await;
            let order = orders
                .get_mut(&order_id)
                .ok_or_else(|| CoreError::NotFound(format!("order {order_id} not found")))?;
            order.tracking = record.clone();
            drop(orders);

            self.writes.write().await.push((order_id, record));
            Ok(())
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
