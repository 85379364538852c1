//! Notification outbox types.
//!
//! Emails are never sent from request handlers. They are written to the
//! outbox (in the same transaction as the order when there is one) and
//! delivered by [`crate::services::outbox::OutboxWorker`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use boho_core::OutboxMessageId;

/// What a queued email is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storefront.notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmation,
    AdminOrderNotification,
    PaymentFailed,
}

impl NotificationKind {
    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order_confirmation",
            Self::AdminOrderNotification => "admin_order_notification",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a queued email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storefront.outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    /// Waiting for (another) delivery attempt.
    Pending,
    /// Delivered to the SMTP relay.
    Sent,
    /// Gave up after the maximum number of attempts.
    Failed,
}

/// A rendered email ready to be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxMessage {
    /// Unique per logical notification; a second enqueue with the same key is ignored.
    pub dedupe_key: String,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// A queued email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxMessage {
    pub id: OutboxMessageId,
    pub dedupe_key: String,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub status: OutboxStatus,
    /// Delivery attempts made so far.
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}
