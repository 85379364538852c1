//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use boho_core::{CurrencyCode, Email, OrderId, OrderItemId, OrderStatus, Price};

/// A completed order, written once from a verified checkout webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Database key.
    pub id: OrderId,
    /// Provider checkout session this order came from. Unique.
    pub checkout_session_id: String,
    /// Total charged, including shipping, in major units.
    pub amount_total: Decimal,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub customer_email: Email,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Lines in the order the provider listed them.
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Total as a displayable price.
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::new(self.amount_total, self.currency)
    }
}

/// A line of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: String,
    pub name: String,
    pub quantity: i32,
    /// Line amount (unit price × quantity) in major units.
    pub amount: Decimal,
}

/// Order data extracted from a `checkout.session.completed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub checkout_session_id: String,
    pub amount_total: Decimal,
    pub currency: CurrencyCode,
    pub customer_email: Email,
    pub customer_name: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Total as a displayable price.
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::new(self.amount_total, self.currency)
    }
}

/// A line of an order that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: i32,
    pub amount: Decimal,
}
