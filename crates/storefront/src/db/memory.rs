//! In-memory repositories for tests.
//!
//! [`MemoryStore`] implements both [`OrderRepository`] and
//! [`OutboxRepository`] with the same uniqueness rules as the `PostgreSQL`
//! schema, so handler and worker tests don't need a database.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use boho_core::{OrderId, OrderItemId, OrderStatus};

use super::{OrderRepository, OutboxRepository, RecordOutcome, RepositoryError};
use crate::models::{
    NewOrder, NewOutboxMessage, Order, OrderItem, OutboxMessage, OutboxMessageId, OutboxStatus,
};

#[derive(Default)]
struct Inner {
    orders: Vec<Order>,
    outbox: Vec<OutboxMessage>,
    next_order_id: i64,
    next_item_id: i64,
    next_message_id: i64,
    fail_writes: bool,
}

impl Inner {
    fn push_message(&mut self, message: NewOutboxMessage, now: DateTime<Utc>) -> bool {
        if self
            .outbox
            .iter()
            .any(|existing| existing.dedupe_key == message.dedupe_key)
        {
            return false;
        }

        self.next_message_id += 1;
        self.outbox.push(OutboxMessage {
            id: OutboxMessageId::new(self.next_message_id),
            dedupe_key: message.dedupe_key,
            kind: message.kind,
            recipient: message.recipient,
            subject: message.subject,
            text_body: message.text_body,
            html_body: message.html_body,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: now,
            created_at: now,
            sent_at: None,
        });
        true
    }

    fn message_mut(&mut self, id: OutboxMessageId) -> Result<&mut OutboxMessage, RepositoryError> {
        self.outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::Unavailable(
                "writes disabled for test".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Orders and outbox messages held in a mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every write, order lookup and ping fail with
    /// `RepositoryError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Snapshot of all orders.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Snapshot of all outbox messages.
    #[must_use]
    pub fn outbox(&self) -> Vec<OutboxMessage> {
        self.lock().outbox.clone()
    }

    /// Make every pending message due now, skipping backoff.
    pub fn expedite_pending(&self) {
        let now = Utc::now();
        for message in &mut self.lock().outbox {
            if message.status == OutboxStatus::Pending {
                message.next_attempt_at = now;
            }
        }
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn record_completed_checkout(
        &self,
        order: NewOrder,
        notifications: Vec<NewOutboxMessage>,
    ) -> Result<RecordOutcome, RepositoryError> {
        let mut inner = self.lock();
        inner.check_writable()?;

        if let Some(existing) = inner
            .orders
            .iter()
            .find(|o| o.checkout_session_id == order.checkout_session_id)
        {
            return Ok(RecordOutcome::Duplicate(existing.id));
        }

        let now = Utc::now();
        inner.next_order_id += 1;
        let id = OrderId::new(inner.next_order_id);

        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            inner.next_item_id += 1;
            items.push(OrderItem {
                id: OrderItemId::new(inner.next_item_id),
                product_id: item.product_id,
                name: item.name,
                quantity: item.quantity,
                amount: item.amount,
            });
        }

        let created = Order {
            id,
            checkout_session_id: order.checkout_session_id,
            amount_total: order.amount_total,
            currency: order.currency,
            status: OrderStatus::Completed,
            customer_email: order.customer_email,
            customer_name: order.customer_name,
            created_at: now,
            items,
        };
        inner.orders.push(created.clone());

        for message in notifications {
            inner.push_message(message, now);
        }

        Ok(RecordOutcome::Created(created))
    }

    async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let inner = self.lock();
        inner.check_writable()?;
        Ok(inner
            .orders
            .iter()
            .find(|o| o.checkout_session_id == checkout_session_id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.lock().check_writable()
    }
}

#[async_trait]
impl OutboxRepository for MemoryStore {
    async fn enqueue(&self, message: NewOutboxMessage) -> Result<bool, RepositoryError> {
        let mut inner = self.lock();
        inner.check_writable()?;
        Ok(inner.push_message(message, Utc::now()))
    }

    async fn claim_due(
        &self,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<OutboxMessage>, RepositoryError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| RepositoryError::InvalidInput(format!("invalid lease: {e}")))?;
        let limit = usize::try_from(limit).unwrap_or(0);

        let mut inner = self.lock();
        let mut due: Vec<&mut OutboxMessage> = inner
            .outbox
            .iter_mut()
            .filter(|m| m.status == OutboxStatus::Pending && m.next_attempt_at <= now)
            .collect();
        due.sort_by_key(|m| m.next_attempt_at);

        Ok(due
            .into_iter()
            .take(limit)
            .map(|m| {
                m.attempts += 1;
                m.next_attempt_at = now + lease;
                m.clone()
            })
            .collect())
    }

    async fn mark_sent(&self, id: OutboxMessageId) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let message = inner.message_mut(id)?;
        message.status = OutboxStatus::Sent;
        message.sent_at = Some(Utc::now());
        message.last_error = None;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: OutboxMessageId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let message = inner.message_mut(id)?;
        message.last_error = Some(error.to_owned());
        message.next_attempt_at = next_attempt_at;
        Ok(())
    }

    async fn mark_failed(&self, id: OutboxMessageId, error: &str) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let message = inner.message_mut(id)?;
        message.status = OutboxStatus::Failed;
        message.last_error = Some(error.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use boho_core::{CurrencyCode, Email};

    use super::*;
    use crate::models::{NewOrderItem, NotificationKind};

    fn new_order(session: &str) -> NewOrder {
        NewOrder {
            checkout_session_id: session.to_string(),
            amount_total: Decimal::new(24895, 2),
            currency: CurrencyCode::USD,
            customer_email: Email::parse("jane@example.com").unwrap(),
            customer_name: Some("Jane Doe".to_string()),
            items: vec![NewOrderItem {
                product_id: "boho-hoop-earrings".to_string(),
                name: "Handcrafted Boho Hoop Earrings".to_string(),
                quantity: 2,
                amount: Decimal::new(17800, 2),
            }],
        }
    }

    fn message(key: &str) -> NewOutboxMessage {
        NewOutboxMessage {
            dedupe_key: key.to_string(),
            kind: NotificationKind::OrderConfirmation,
            recipient: "jane@example.com".to_string(),
            subject: "Order Confirmation".to_string(),
            text_body: "text".to_string(),
            html_body: "<p>html</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_session_writes_nothing() {
        let store = MemoryStore::new();
        let first = store
            .record_completed_checkout(new_order("cs_1"), vec![message("a")])
            .await
            .unwrap();
        let RecordOutcome::Created(order) = first else {
            panic!("expected a new order");
        };

        let second = store
            .record_completed_checkout(new_order("cs_1"), vec![message("b")])
            .await
            .unwrap();

        assert_eq!(second, RecordOutcome::Duplicate(order.id));
        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.outbox().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_persists_nothing() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);

        let result = store
            .record_completed_checkout(new_order("cs_1"), vec![message("a")])
            .await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        assert!(store.orders().is_empty());
        assert!(store.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_claim_leases_messages() {
        let store = MemoryStore::new();
        assert!(store.enqueue(message("a")).await.unwrap());
        assert!(!store.enqueue(message("a")).await.unwrap());

        let claimed = store.claim_due(10, Duration::from_secs(60)).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);

        // Leased: not due again until the lease expires.
        assert!(store.claim_due(10, Duration::from_secs(60)).await.unwrap().is_empty());

        store.mark_sent(claimed[0].id).await.unwrap();
        store.expedite_pending();
        assert!(store.claim_due(10, Duration::from_secs(60)).await.unwrap().is_empty());
        assert_eq!(store.outbox()[0].status, OutboxStatus::Sent);
    }

    #[tokio::test]
    async fn test_unrepresentable_lease_is_invalid_input() {
        let store = MemoryStore::new();
        store.enqueue(message("a")).await.unwrap();

        let result = store.claim_due(10, Duration::MAX).await;

        assert!(matches!(result, Err(RepositoryError::InvalidInput(_))));
        assert_eq!(store.outbox()[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_find_by_checkout_session() {
        let store = MemoryStore::new();
        store
            .record_completed_checkout(new_order("cs_1"), Vec::new())
            .await
            .unwrap();

        let found = store.find_by_checkout_session("cs_1").await.unwrap().unwrap();
        assert_eq!(found.total().display(), "$248.95");
        assert_eq!(found.items[0].name, "Handcrafted Boho Hoop Earrings");
        assert!(store.find_by_checkout_session("cs_2").await.unwrap().is_none());
    }
}
