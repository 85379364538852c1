//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `boho_storefront`
//!
//! Products and carts never touch the database. It holds only what the
//! payment webhook produces:
//!
//! ## Tables
//!
//! - `storefront.orders` - One row per completed checkout session (unique `checkout_session_id`)
//! - `storefront.order_items` - Lines of each order
//! - `storefront.notification_outbox` - Emails waiting for delivery (unique `dedupe_key`)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p boho-cli -- migrate
//! ```

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod orders;
pub mod outbox;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use boho_core::OrderId;

use crate::models::{NewOrder, NewOutboxMessage, Order, OutboxMessage, OutboxMessageId};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use orders::PgOrderRepository;
pub use outbox::PgOutboxRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Arguments the store cannot represent (an oversized order, a lease
    /// out of range).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Store deliberately unavailable (in-memory test double).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of recording a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new order was written along with its notifications.
    Created(Order),
    /// The session was already recorded; nothing was written.
    Duplicate(OrderId),
}

/// Order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Write an order, its items and its notifications in one transaction.
    ///
    /// A session id that already has an order is not an error: the call
    /// returns [`RecordOutcome::Duplicate`] and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the transaction fails. Nothing is
    /// persisted in that case.
    async fn record_completed_checkout(
        &self,
        order: NewOrder,
        notifications: Vec<NewOutboxMessage>,
    ) -> Result<RecordOutcome, RepositoryError>;

    /// Look up the order for a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is invalid.
    async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Check the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if it is not.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Email outbox persistence.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Queue a message on its own. Returns `false` if the dedupe key already exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    async fn enqueue(&self, message: NewOutboxMessage) -> Result<bool, RepositoryError>;

    /// Claim up to `limit` due pending messages.
    ///
    /// Claiming counts an attempt and pushes `next_attempt_at` out by `lease`,
    /// so a worker that dies mid-delivery releases its messages when the
    /// lease runs out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    async fn claim_due(
        &self,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<OutboxMessage>, RepositoryError>;

    /// Record a successful delivery.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update fails.
    async fn mark_sent(&self, id: OutboxMessageId) -> Result<(), RepositoryError>;

    /// Record a failed attempt and schedule the next one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update fails.
    async fn mark_retry(
        &self,
        id: OutboxMessageId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Give up on a message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update fails.
    async fn mark_failed(&self, id: OutboxMessageId, error: &str) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
