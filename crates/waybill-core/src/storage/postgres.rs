//! Repository for order tracking data in PostgreSQL.
//!
//! Orders live in `orders` with the two tracking columns; line items live in
//! `order_line_items`. Tracking writes touch both columns in a single
//! `UPDATE` inside a transaction.

use std::sync::Arc;

use sqlx::{Executor, PgPool, Postgres, Transaction};
use tracing::debug;

use super::{OrderTrackingStore, StoreFuture};
use crate::{
    error::{CoreError, Result},
    models::{LineItem, Order, OrderId, TrackingField, TrackingRecord},
};

/// PostgreSQL implementation of `OrderTrackingStore`.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    /// Creates a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Finds an order with its line items.
    ///
    /// # Errors
    ///
    /// Returns error if either query fails.
    pub async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        if !order_id.is_storable() {
            return Ok(None);
        }

        let tracking = sqlx::query_as::<_, TrackingRecord>(
            "SELECT tracking_number, tracking_url FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&*self.pool)
        .await?;

        let Some(tracking) = tracking else { return Ok(None) };

        let line_items = sqlx::query_as::<_, LineItem>(
            r"
            SELECT name, is_virtual, is_downloadable, product_type
            FROM order_line_items
            WHERE order_id = $1
            ORDER BY position, id
            ",
        )
        .bind(order_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(Some(Order { id: order_id, line_items, tracking }))
    }

    /// Reads one tracking column.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_tracking_field(
        &self,
        order_id: OrderId,
        field: TrackingField,
    ) -> Result<Option<String>> {
        if !order_id.is_storable() {
            return Ok(None);
        }

        let query = format!("SELECT {} FROM orders WHERE id = $1", field.column());
        let value: Option<Option<String>> =
            sqlx::query_scalar(&query).bind(order_id).fetch_optional(&*self.pool).await?;

        Ok(value.flatten())
    }

    /// Writes both tracking columns in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the order does not exist, or a
    /// database error if the write or commit fails.
    pub async fn update_tracking(&self, order_id: OrderId, record: &TrackingRecord) -> Result<()> {
        if !order_id.is_storable() {
            return Err(CoreError::NotFound(format!("order {order_id} not found")));
        }

        let mut tx = self.pool.begin().await?;
        self.update_tracking_in_tx(&mut tx, order_id, record).await?;
        tx.commit().await?;

        debug!(order_id = %order_id, "tracking columns committed");
        Ok(())
    }

    /// Writes both tracking columns within a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the order does not exist.
    pub async fn update_tracking_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        record: &TrackingRecord,
    ) -> Result<()> {
        self.update_tracking_impl(&mut **tx, order_id, record).await
    }

    async fn update_tracking_impl<'e, E>(
        &self,
        executor: E,
        order_id: OrderId,
        record: &TrackingRecord,
    ) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if !order_id.is_storable() {
            return Err(CoreError::NotFound(format!("order {order_id} not found")));
        }

        let result = sqlx::query(
            r"
            UPDATE orders
            SET tracking_number = $2,
                tracking_url = $3,
                tracking_updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(record.tracking_number.as_deref())
        .bind(record.tracking_url.as_deref())
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("order {order_id} not found")));
        }
        Ok(())
    }

    /// Inserts an order and its line items, used for seeding.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` for ids above `OrderId::MAX`, or a
    /// database error if insert fails or the order already exists.
    pub async fn insert_order(&self, order: &Order) -> Result<()> {
        if !order.id.is_storable() {
            return Err(CoreError::InvalidInput(format!("order id {} out of range", order.id)));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO orders (id, tracking_number, tracking_url) VALUES ($1, $2, $3)")
            .bind(order.id)
            .bind(order.tracking.tracking_number.as_deref())
            .bind(order.tracking.tracking_url.as_deref())
            .execute(&mut *tx)
            .await?;

        for (position, item) in order.line_items.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO order_line_items (
                    order_id, position, name, is_virtual, is_downloadable, product_type
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order.id)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(&item.name)
            .bind(item.is_virtual)
            .bind(item.is_downloadable)
            .bind(&item.product_type)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Creates the order tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS orders (
                id BIGINT PRIMARY KEY,
                tracking_number TEXT,
                tracking_url TEXT,
                tracking_updated_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS order_line_items (
                id BIGSERIAL PRIMARY KEY,
                order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                position INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                is_virtual BOOLEAN NOT NULL DEFAULT FALSE,
                is_downloadable BOOLEAN NOT NULL DEFAULT FALSE,
                product_type TEXT NOT NULL DEFAULT 'simple'
            )
            ",
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_order_line_items_order
            ON order_line_items(order_id, position)
            ",
        )
        .execute(&*self.pool)
        .await?;

        Ok(())
    }
}

impl OrderTrackingStore for PostgresOrderStore {
    fn find_order(&self, order_id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move { self.find_by_id(order_id).await })
    }

    fn tracking_field(
        &self,
        order_id: OrderId,
        field: TrackingField,
    ) -> StoreFuture<'_, Option<String>> {
        Box::pin(async move { self.find_tracking_field(order_id, field).await })
    }

    fn set_tracking(&self, order_id: OrderId, record: TrackingRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.update_tracking(order_id, &record).await })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;
            Ok(())
        })
    }
}
