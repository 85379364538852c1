//! Status enums for orders and payment redirects.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a persisted order.
///
/// Orders are only written from a verified completed checkout, so
/// `Completed` is the one state produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Completed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// Outcome reported by the provider when it redirects the browser back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedirectStatus {
    Succeeded,
    Failed,
    /// No status yet (or one we don't recognize).
    #[default]
    Processing,
}

impl RedirectStatus {
    /// Interpret the `redirect_status` query value.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("succeeded") => Self::Succeeded,
            Some("failed") => Self::Failed,
            _ => Self::Processing,
        }
    }

    /// Whether the browser cart should be cleared.
    #[must_use]
    pub const fn clears_cart(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
