//! Notification emails written to the outbox.
//!
//! Every message gets a dedupe key derived from what it is about, so a
//! redelivered webhook can never queue the same email twice:
//!
//! | Kind | Key |
//! |------|-----|
//! | order confirmation | `order-confirmation:{checkout session}` |
//! | admin notification | `admin-order:{checkout session}` |
//! | payment failed | `payment-failed:{event id}` |

use askama::Template;

use boho_core::{Email, Price};

use crate::models::{NewOrder, NewOutboxMessage, NotificationKind};

/// Shown in subjects and signatures.
pub const STORE_NAME: &str = "Boho Baha Earrings";

/// An order line as it appears in an email.
struct LineView {
    name: String,
    quantity: i32,
    amount: String,
}

fn line_views(order: &NewOrder) -> Vec<LineView> {
    order
        .items
        .iter()
        .map(|item| LineView {
            name: item.name.clone(),
            quantity: item.quantity,
            amount: Price::new(item.amount, order.currency).display(),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    store_name: &'a str,
    customer_name: Option<&'a str>,
    order_ref: &'a str,
    total: &'a str,
    lines: &'a [LineView],
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    store_name: &'a str,
    customer_name: Option<&'a str>,
    order_ref: &'a str,
    total: &'a str,
    lines: &'a [LineView],
}

#[derive(Template)]
#[template(path = "email/admin_order.html")]
struct AdminOrderHtml<'a> {
    order_ref: &'a str,
    customer_email: &'a str,
    customer_name: Option<&'a str>,
    total: &'a str,
    lines: &'a [LineView],
}

#[derive(Template)]
#[template(path = "email/admin_order.txt")]
struct AdminOrderText<'a> {
    order_ref: &'a str,
    customer_email: &'a str,
    customer_name: Option<&'a str>,
    total: &'a str,
    lines: &'a [LineView],
}

#[derive(Template)]
#[template(path = "email/payment_failed.html")]
struct PaymentFailedHtml<'a> {
    store_name: &'a str,
    reason: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/payment_failed.txt")]
struct PaymentFailedText<'a> {
    store_name: &'a str,
    reason: Option<&'a str>,
}

/// Customer confirmation for a completed checkout.
///
/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn order_confirmation(order: &NewOrder) -> Result<NewOutboxMessage, askama::Error> {
    let lines = line_views(order);
    let total = order.total().display();
    let order_ref = order.checkout_session_id.as_str();
    let customer_name = order.customer_name.as_deref();

    let html_body = OrderConfirmationHtml {
        store_name: STORE_NAME,
        customer_name,
        order_ref,
        total: &total,
        lines: &lines,
    }
    .render()?;
    let text_body = OrderConfirmationText {
        store_name: STORE_NAME,
        customer_name,
        order_ref,
        total: &total,
        lines: &lines,
    }
    .render()?;

    Ok(NewOutboxMessage {
        dedupe_key: format!("order-confirmation:{order_ref}"),
        kind: NotificationKind::OrderConfirmation,
        recipient: order.customer_email.as_str().to_string(),
        subject: format!("Order Confirmation - {STORE_NAME}"),
        text_body,
        html_body,
    })
}

/// Store-owner notification for a completed checkout.
///
/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn admin_order_notification(
    order: &NewOrder,
    admin: &Email,
) -> Result<NewOutboxMessage, askama::Error> {
    let lines = line_views(order);
    let total = order.total().display();
    let order_ref = order.checkout_session_id.as_str();
    let customer_email = order.customer_email.as_str();
    let customer_name = order.customer_name.as_deref();

    let html_body = AdminOrderHtml {
        order_ref,
        customer_email,
        customer_name,
        total: &total,
        lines: &lines,
    }
    .render()?;
    let text_body = AdminOrderText {
        order_ref,
        customer_email,
        customer_name,
        total: &total,
        lines: &lines,
    }
    .render()?;

    Ok(NewOutboxMessage {
        dedupe_key: format!("admin-order:{order_ref}"),
        kind: NotificationKind::AdminOrderNotification,
        recipient: admin.as_str().to_string(),
        subject: format!("New order {total} from {customer_email}"),
        text_body,
        html_body,
    })
}

/// Customer notice for a failed payment intent.
///
/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn payment_failed(
    event_id: &str,
    recipient: &Email,
    reason: Option<&str>,
) -> Result<NewOutboxMessage, askama::Error> {
    let html_body = PaymentFailedHtml {
        store_name: STORE_NAME,
        reason,
    }
    .render()?;
    let text_body = PaymentFailedText {
        store_name: STORE_NAME,
        reason,
    }
    .render()?;

    Ok(NewOutboxMessage {
        dedupe_key: format!("payment-failed:{event_id}"),
        kind: NotificationKind::PaymentFailed,
        recipient: recipient.as_str().to_string(),
        subject: format!("Payment Failed - {STORE_NAME}"),
        text_body,
        html_body,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use boho_core::CurrencyCode;

    use super::*;
    use crate::models::NewOrderItem;

    fn order() -> NewOrder {
        NewOrder {
            checkout_session_id: "cs_test_a1".to_string(),
            amount_total: Decimal::new(24895, 2),
            currency: CurrencyCode::USD,
            customer_email: Email::parse("jane@example.com").unwrap(),
            customer_name: Some("Jane <Doe>".to_string()),
            items: vec![NewOrderItem {
                product_id: "boho-hoop-earrings".to_string(),
                name: "Handcrafted Boho Hoop Earrings".to_string(),
                quantity: 2,
                amount: Decimal::new(17800, 2),
            }],
        }
    }

    #[test]
    fn test_order_confirmation() {
        let message = order_confirmation(&order()).unwrap();

        assert_eq!(message.dedupe_key, "order-confirmation:cs_test_a1");
        assert_eq!(message.recipient, "jane@example.com");
        assert_eq!(message.subject, "Order Confirmation - Boho Baha Earrings");
        assert!(message.text_body.contains("$248.95"));
        assert!(message.text_body.contains("Handcrafted Boho Hoop Earrings x 2"));
        assert!(message.html_body.contains("$178.00"));
        assert!(message.text_body.contains("Jane <Doe>"));
        assert!(!message.html_body.contains("Jane <Doe>"));
    }

    #[test]
    fn test_admin_notification_goes_to_admin() {
        let admin = Email::parse("owner@bohobaha.com").unwrap();
        let message = admin_order_notification(&order(), &admin).unwrap();

        assert_eq!(message.dedupe_key, "admin-order:cs_test_a1");
        assert_eq!(message.recipient, "owner@bohobaha.com");
        assert_eq!(message.kind, NotificationKind::AdminOrderNotification);
        assert!(message.text_body.contains("jane@example.com"));
    }

    #[test]
    fn test_payment_failed_keyed_by_event() {
        let to = Email::parse("jane@example.com").unwrap();
        let message = payment_failed("evt_9", &to, Some("Your card was declined.")).unwrap();

        assert_eq!(message.dedupe_key, "payment-failed:evt_9");
        assert_eq!(message.subject, "Payment Failed - Boho Baha Earrings");
        assert!(message.text_body.contains("Your card was declined."));
    }
}
