//! Notification outbox backed by `PostgreSQL`.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so several storefront processes can
//! run a worker against the same table without delivering a message twice.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::{OutboxRepository, RepositoryError};
use crate::models::{
    NewOutboxMessage, NotificationKind, OutboxMessage, OutboxMessageId, OutboxStatus,
};

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: OutboxMessageId,
    dedupe_key: String,
    kind: NotificationKind,
    recipient: String,
    subject: String,
    text_body: String,
    html_body: String,
    status: OutboxStatus,
    attempts: i32,
    last_error: Option<String>,
    next_attempt_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        Self {
            id: row.id,
            dedupe_key: row.dedupe_key,
            kind: row.kind,
            recipient: row.recipient,
            subject: row.subject,
            text_body: row.text_body,
            html_body: row.html_body,
            status: row.status,
            attempts: row.attempts,
            last_error: row.last_error,
            next_attempt_at: row.next_attempt_at,
            created_at: row.created_at,
            sent_at: row.sent_at,
        }
    }
}

/// Insert a message on an existing connection (usually an open transaction).
///
/// Returns `false` when a message with the same dedupe key already exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_message(
    conn: &mut PgConnection,
    message: &NewOutboxMessage,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO storefront.notification_outbox (
            dedupe_key, kind, recipient, subject, text_body, html_body
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (dedupe_key) DO NOTHING
        ",
    )
    .bind(&message.dedupe_key)
    .bind(message.kind)
    .bind(&message.recipient)
    .bind(&message.subject)
    .bind(&message.text_body)
    .bind(&message.html_body)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// `PostgreSQL` implementation of [`OutboxRepository`].
#[derive(Clone)]
pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    /// Create a new outbox repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn enqueue(&self, message: NewOutboxMessage) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_message(&mut conn, &message).await
    }

    async fn claim_due(
        &self,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<OutboxMessage>, RepositoryError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r"
            UPDATE storefront.notification_outbox
            SET attempts = attempts + 1,
                next_attempt_at = now() + make_interval(secs => $2)
            WHERE id IN (
                SELECT id
                FROM storefront.notification_outbox
                WHERE status = 'pending' AND next_attempt_at <= now()
                ORDER BY next_attempt_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, dedupe_key, kind, recipient, subject, text_body, html_body,
                      status, attempts, last_error, next_attempt_at, created_at, sent_at
            ",
        )
        .bind(limit)
        .bind(lease.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OutboxMessage::from).collect())
    }

    async fn mark_sent(&self, id: OutboxMessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.notification_outbox
            SET status = 'sent', sent_at = now(), last_error = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: OutboxMessageId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.notification_outbox
            SET last_error = $2, next_attempt_at = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: OutboxMessageId, error: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.notification_outbox
            SET status = 'failed', last_error = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
