//! Domain models for storefront.
//!
//! These types represent validated domain objects separate from database row types.

pub mod order;
pub mod outbox;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem};
pub use outbox::{NewOutboxMessage, NotificationKind, OutboxMessage, OutboxMessageId, OutboxStatus};
