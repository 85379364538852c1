//! Dispatch of verified payment events.
//!
//! Only a `checkout.session.completed` event creates an order. The order,
//! its items and both notification emails are written in one transaction;
//! a redelivered event finds the existing order and writes nothing.

use std::str::FromStr;

use tracing::{debug, info, instrument, warn};

use boho_core::{CurrencyCode, Email, OrderId, from_minor_units};

use crate::db::RecordOutcome;
use crate::error::{AppError, Result};
use crate::models::{NewOrder, NewOrderItem};
use crate::payments::{CheckoutSessionCompleted, PaymentIntentObject, SessionLineItem, WebhookEvent};
use crate::state::AppState;

use super::notifications;

/// What a webhook event resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new order was recorded.
    OrderCreated(OrderId),
    /// The session already had an order.
    DuplicateOrder(OrderId),
    /// Nothing to persist.
    Acknowledged,
}

/// Act on a verified, decoded event.
///
/// # Errors
///
/// - `AppError::Validation` if the session lacks a usable email, currency or line item
/// - `AppError::PaymentProvider` if line items have to be fetched and the fetch fails
/// - `AppError::Persistence` if the order transaction fails
/// - `AppError::Template` if a notification fails to render
#[instrument(skip(state, event), fields(event_id = %event.event_id(), event_type = %event.event_type()))]
pub async fn handle_event(state: &AppState, event: WebhookEvent) -> Result<WebhookOutcome> {
    match event {
        WebhookEvent::CheckoutSessionCompleted { session, .. } => {
            record_checkout(state, session).await
        }
        WebhookEvent::PaymentIntentSucceeded { intent, .. } => {
            info!(
                payment_intent = %intent.id,
                amount = ?intent.amount,
                "Payment intent succeeded"
            );
            Ok(WebhookOutcome::Acknowledged)
        }
        WebhookEvent::PaymentIntentFailed { event_id, intent } => {
            queue_payment_failed(state, &event_id, &intent).await;
            Ok(WebhookOutcome::Acknowledged)
        }
        WebhookEvent::Other { event_type, .. } => {
            debug!(%event_type, "Ignoring webhook event");
            Ok(WebhookOutcome::Acknowledged)
        }
    }
}

async fn record_checkout(
    state: &AppState,
    session: CheckoutSessionCompleted,
) -> Result<WebhookOutcome> {
    let line_items = session_line_items(state, &session).await?;
    let order = new_order(&session, &line_items)?;

    let confirmation = notifications::order_confirmation(&order)?;
    let admin = notifications::admin_order_notification(&order, &state.config().email.admin_address)?;

    let session_id = order.checkout_session_id.clone();
    match state
        .orders()
        .record_completed_checkout(order, vec![confirmation, admin])
        .await?
    {
        RecordOutcome::Created(order) => {
            info!(
                order_id = %order.id,
                checkout_session_id = %session_id,
                amount_total = %order.amount_total,
                items = order.items.len(),
                "Order recorded"
            );
            state.notify_outbox();
            Ok(WebhookOutcome::OrderCreated(order.id))
        }
        RecordOutcome::Duplicate(id) => {
            info!(order_id = %id, checkout_session_id = %session_id, "Order already recorded");
            Ok(WebhookOutcome::DuplicateOrder(id))
        }
    }
}

/// Embedded line items when the event carries the complete list, otherwise
/// fetched from the provider.
async fn session_line_items(
    state: &AppState,
    session: &CheckoutSessionCompleted,
) -> Result<Vec<SessionLineItem>> {
    if let Some(page) = &session.line_items
        && !page.has_more
    {
        return Ok(page.data.clone());
    }

    debug!(checkout_session_id = %session.id, "Fetching session line items");
    Ok(state.payments().list_checkout_line_items(&session.id).await?)
}

fn new_order(session: &CheckoutSessionCompleted, line_items: &[SessionLineItem]) -> Result<NewOrder> {
    let currency = CurrencyCode::from_str(&session.currency).map_err(AppError::Validation)?;

    let customer_email = session
        .customer_email()
        .ok_or_else(|| AppError::Validation("Checkout session has no customer email".to_string()))
        .and_then(|raw| {
            Email::parse(raw).map_err(|e| AppError::Validation(format!("Invalid customer email: {e}")))
        })?;

    let items = line_items
        .iter()
        .map(order_item)
        .collect::<Result<Vec<_>>>()?;

    Ok(NewOrder {
        checkout_session_id: session.id.clone(),
        amount_total: from_minor_units(session.amount_total),
        currency,
        customer_email,
        customer_name: session.customer_name().map(str::to_string),
        items,
    })
}

fn order_item(line: &SessionLineItem) -> Result<NewOrderItem> {
    let quantity = i32::try_from(line.quantity.unwrap_or(1))
        .map_err(|_| AppError::Validation("Line item quantity out of range".to_string()))?;

    Ok(NewOrderItem {
        product_id: line.product_id().unwrap_or("unknown").to_string(),
        name: line.name().unwrap_or("Item").to_string(),
        quantity,
        amount: from_minor_units(line.amount_total),
    })
}

/// Queue a payment-failed email. Failures here never fail the webhook.
async fn queue_payment_failed(state: &AppState, event_id: &str, intent: &PaymentIntentObject) {
    let reason = intent
        .last_payment_error
        .as_ref()
        .and_then(|e| e.message.as_deref());
    warn!(payment_intent = %intent.id, reason = ?reason, "Payment intent failed");

    let Some(raw_email) = intent.receipt_email.as_deref() else {
        debug!(payment_intent = %intent.id, "No receipt email, skipping notification");
        return;
    };

    let message = Email::parse(raw_email)
        .map_err(|e| e.to_string())
        .and_then(|to| notifications::payment_failed(event_id, &to, reason).map_err(|e| e.to_string()));

    let queued = match message {
        Ok(message) => state.outbox().enqueue(message).await.map_err(|e| e.to_string()),
        Err(e) => Err(e),
    };

    match queued {
        Ok(true) => state.notify_outbox(),
        Ok(false) => debug!(payment_intent = %intent.id, "Payment failed email already queued"),
        Err(error) => warn!(
            payment_intent = %intent.id,
            %error,
            "Failed to queue payment failed email"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NotificationKind, OutboxStatus};
    use crate::payments::FakeProvider;
    use crate::services::checkout::tests::config;

    fn state(store: &Arc<MemoryStore>, provider: &Arc<FakeProvider>) -> AppState {
        AppState::new(
            config(),
            provider.clone(),
            store.clone(),
            store.clone(),
            Arc::new(Notify::new()),
        )
    }

    fn line(value: serde_json::Value) -> SessionLineItem {
        serde_json::from_value(value).unwrap()
    }

    fn hoops_line() -> SessionLineItem {
        line(hoops_json())
    }

    fn hoops_json() -> serde_json::Value {
        json!({
            "description": "Handcrafted Boho Hoop Earrings",
            "quantity": 2,
            "amount_total": 17800,
            "price": {
                "id": "price_1",
                "unit_amount": 8900,
                "product": {
                    "id": "prod_1",
                    "name": "Handcrafted Boho Hoop Earrings",
                    "metadata": { "product_id": "boho-hoop-earrings" }
                }
            }
        })
    }

    fn completed(session_id: &str, embedded: bool) -> WebhookEvent {
        let mut object = json!({
            "id": session_id,
            "amount_total": 24895,
            "currency": "usd",
            "customer_details": { "email": "jane@example.com", "name": "Jane Doe" }
        });
        if embedded {
            object["line_items"] = json!({ "data": [hoops_json()], "has_more": false });
        }
        WebhookEvent::CheckoutSessionCompleted {
            event_id: "evt_1".to_string(),
            session: serde_json::from_value(object).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_completed_session_records_order_and_emails() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());

        let outcome = handle_event(&state(&store, &provider), completed("cs_1", true))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::OrderCreated(_)));
        let orders = store.orders();
        assert_eq!(orders[0].amount_total, Decimal::new(24895, 2));
        assert_eq!(orders[0].customer_name.as_deref(), Some("Jane Doe"));
        assert_eq!(orders[0].items[0].product_id, "boho-hoop-earrings");
        assert_eq!(orders[0].items[0].amount, Decimal::new(17800, 2));

        let kinds: Vec<_> = store.outbox().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            [
                NotificationKind::OrderConfirmation,
                NotificationKind::AdminOrderNotification
            ]
        );
        assert!(provider.line_item_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_line_items_are_fetched() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new().with_line_items(vec![hoops_line()]));

        handle_event(&state(&store, &provider), completed("cs_2", false))
            .await
            .unwrap();

        assert_eq!(provider.line_item_calls(), ["cs_2"]);
        assert_eq!(store.orders()[0].items.len(), 1);
    }

    #[tokio::test]
    async fn test_truncated_embedded_line_items_are_refetched() {
        let store = Arc::new(MemoryStore::new());
        let second = line(json!({ "description": "Turquoise Drop Earrings", "quantity": 1, "amount_total": 6500 }));
        let provider = Arc::new(FakeProvider::new().with_line_items(vec![hoops_line(), second]));

        let WebhookEvent::CheckoutSessionCompleted { event_id, mut session } = completed("cs_4", true) else {
            unreachable!()
        };
        if let Some(page) = session.line_items.as_mut() {
            page.has_more = true;
        }

        handle_event(
            &state(&store, &provider),
            WebhookEvent::CheckoutSessionCompleted { event_id, session },
        )
        .await
        .unwrap();

        assert_eq!(provider.line_item_calls(), ["cs_4"]);
        let names: Vec<_> = store.orders()[0].items.iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, ["Handcrafted Boho Hoop Earrings", "Turquoise Drop Earrings"]);
    }

    #[tokio::test]
    async fn test_line_item_fetch_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        provider.fail_with(500, "API unavailable");

        let result = handle_event(&state(&store, &provider), completed("cs_3", false)).await;

        assert!(matches!(result, Err(AppError::PaymentProvider(_))));
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let state = state(&store, &provider);

        let first = handle_event(&state, completed("cs_4", true)).await.unwrap();
        let second = handle_event(&state, completed("cs_4", true)).await.unwrap();

        let WebhookOutcome::OrderCreated(id) = first else {
            panic!("expected a new order");
        };
        assert_eq!(second, WebhookOutcome::DuplicateOrder(id));
        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.outbox().len(), 2);
    }

    #[tokio::test]
    async fn test_session_without_email_rejected() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let event = WebhookEvent::CheckoutSessionCompleted {
            event_id: "evt_5".to_string(),
            session: serde_json::from_value(json!({
                "id": "cs_5",
                "amount_total": 100,
                "currency": "usd",
                "line_items": { "data": [], "has_more": false }
            }))
            .unwrap(),
        };

        let result = handle_event(&state(&store, &provider), event).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_payment_failed_queues_email_once() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let state = state(&store, &provider);
        let event = || WebhookEvent::PaymentIntentFailed {
            event_id: "evt_6".to_string(),
            intent: serde_json::from_value(json!({
                "id": "pi_1",
                "receipt_email": "jane@example.com",
                "last_payment_error": { "message": "Your card was declined." }
            }))
            .unwrap(),
        };

        handle_event(&state, event()).await.unwrap();
        handle_event(&state, event()).await.unwrap();

        let outbox = store.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].dedupe_key, "payment-failed:evt_6");
        assert_eq!(outbox[0].status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn test_payment_failed_enqueue_error_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        store.set_fail_writes(true);
        let event = WebhookEvent::PaymentIntentFailed {
            event_id: "evt_7".to_string(),
            intent: serde_json::from_value(json!({
                "id": "pi_2",
                "receipt_email": "jane@example.com"
            }))
            .unwrap(),
        };

        let outcome = handle_event(&state(&store, &provider), event).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Acknowledged);
    }
}
