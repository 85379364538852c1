//! Order repository backed by `PostgreSQL`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use boho_core::{CurrencyCode, Email, OrderId, OrderItemId, OrderStatus};

use super::{OrderRepository, RecordOutcome, RepositoryError, outbox};
use crate::models::{NewOrder, NewOutboxMessage, Order, OrderItem};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    checkout_session_id: String,
    amount_total: Decimal,
    currency: String,
    status: OrderStatus,
    customer_email: String,
    customer_name: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: String,
    name: String,
    quantity: i32,
    amount: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            amount: row.amount,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let customer_email = Email::parse(&self.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let currency = CurrencyCode::from_str(&self.currency).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
        })?;

        Ok(Order {
            id: self.id,
            checkout_session_id: self.checkout_session_id,
            amount_total: self.amount_total,
            currency,
            status: self.status,
            customer_email,
            customer_name: self.customer_name,
            created_at: self.created_at,
            items,
        })
    }
}

/// `PostgreSQL` implementation of [`OrderRepository`].
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    #[tracing::instrument(skip_all, fields(checkout_session_id = %order.checkout_session_id))]
    async fn record_completed_checkout(
        &self,
        order: NewOrder,
        notifications: Vec<NewOutboxMessage>,
    ) -> Result<RecordOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(OrderId, DateTime<Utc>)> = sqlx::query_as(
            r"
            INSERT INTO storefront.orders (
                checkout_session_id, amount_total, currency, status,
                customer_email, customer_name
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (checkout_session_id) DO NOTHING
            RETURNING id, created_at
            ",
        )
        .bind(&order.checkout_session_id)
        .bind(order.amount_total)
        .bind(order.currency.as_provider_str())
        .bind(OrderStatus::Completed)
        .bind(order.customer_email.as_str())
        .bind(order.customer_name.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((order_id, created_at)) = inserted else {
            tx.rollback().await?;

            let (existing,): (OrderId,) = sqlx::query_as(
                "SELECT id FROM storefront.orders WHERE checkout_session_id = $1",
            )
            .bind(&order.checkout_session_id)
            .fetch_one(&self.pool)
            .await?;

            return Ok(RecordOutcome::Duplicate(existing));
        };

        let mut items = Vec::with_capacity(order.items.len());
        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::InvalidInput("too many order items".to_owned()))?;

            let (item_id,): (OrderItemId,) = sqlx::query_as(
                r"
                INSERT INTO storefront.order_items (
                    order_id, position, product_id, name, quantity, amount
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                ",
            )
            .bind(order_id)
            .bind(position)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.amount)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: item_id,
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                amount: item.amount,
            });
        }

        for message in &notifications {
            outbox::insert_message(&mut tx, message).await?;
        }

        tx.commit().await?;

        Ok(RecordOutcome::Created(Order {
            id: order_id,
            checkout_session_id: order.checkout_session_id,
            amount_total: order.amount_total,
            currency: order.currency,
            status: OrderStatus::Completed,
            customer_email: order.customer_email,
            customer_name: order.customer_name,
            created_at,
            items,
        }))
    }

    async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r"
            SELECT id, checkout_session_id, amount_total, currency, status,
                   customer_email, customer_name, created_at
            FROM storefront.orders
            WHERE checkout_session_id = $1
            ",
        )
        .bind(checkout_session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT id, product_id, name, quantity, amount
            FROM storefront.order_items
            WHERE order_id = $1
            ORDER BY position
            ",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        row.into_order(items.into_iter().map(OrderItem::from).collect())
            .map(Some)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
