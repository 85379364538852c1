//! Checkout result pages.
//!
//! Both pages are plain HTML; on success they clear the browser cart.
//! The checkout page also shows the order once the webhook has recorded it.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::{instrument, warn};

use boho_core::cart::DEFAULT_CART_KEY;
use boho_core::{Price, RedirectStatus};

use crate::models::Order;
use crate::services::notifications::STORE_NAME;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutSuccessQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentSuccessQuery {
    pub payment_intent: Option<String>,
    pub redirect_status: Option<String>,
}

/// A recorded order as the success page shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub total: String,
    pub lines: Vec<SummaryLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub name: String,
    pub quantity: i32,
    pub amount: String,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            total: order.total().display(),
            lines: order
                .items
                .iter()
                .map(|item| SummaryLine {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    amount: Price::new(item.amount, order.currency).display(),
                })
                .collect(),
        }
    }
}

/// Hosted checkout success page.
#[derive(Template, WebTemplate)]
#[template(path = "pages/checkout_success.html")]
pub struct CheckoutSuccessTemplate {
    pub store_name: &'static str,
    pub cart_key: &'static str,
    pub clear_cart: bool,
    pub session_id: Option<String>,
    /// `None` until the webhook has been processed.
    pub order: Option<OrderSummary>,
}

/// Embedded payment result page.
#[derive(Template, WebTemplate)]
#[template(path = "pages/payment_result.html")]
pub struct PaymentResultTemplate {
    pub store_name: &'static str,
    pub cart_key: &'static str,
    pub clear_cart: bool,
    pub heading: &'static str,
    pub message: &'static str,
    pub retry: bool,
    pub payment_intent: Option<String>,
}

#[instrument(skip(state))]
pub async fn checkout_success(
    State(state): State<AppState>,
    Query(query): Query<CheckoutSuccessQuery>,
) -> CheckoutSuccessTemplate {
    let session_id = query.session_id.filter(|id| !id.is_empty());
    let order = match &session_id {
        Some(id) => recorded_order(&state, id).await,
        None => None,
    };

    CheckoutSuccessTemplate {
        store_name: STORE_NAME,
        cart_key: DEFAULT_CART_KEY,
        clear_cart: true,
        session_id,
        order,
    }
}

/// Lookup failures still render the page, just without the summary.
async fn recorded_order(state: &AppState, session_id: &str) -> Option<OrderSummary> {
    match state.orders().find_by_checkout_session(session_id).await {
        Ok(order) => order.as_ref().map(OrderSummary::from),
        Err(e) => {
            warn!(checkout_session_id = %session_id, error = %e, "Order lookup failed");
            None
        }
    }
}

#[instrument]
pub async fn payment_success(Query(query): Query<PaymentSuccessQuery>) -> PaymentResultTemplate {
    let status = RedirectStatus::from_query(query.redirect_status.as_deref());
    let (heading, message) = match status {
        RedirectStatus::Succeeded => (
            "Payment successful",
            "Thank you for your order! A confirmation email is on its way.",
        ),
        RedirectStatus::Failed => (
            "Payment failed",
            "Your payment could not be completed. No charge was made.",
        ),
        RedirectStatus::Processing => (
            "Payment processing",
            "We're confirming your payment. You'll receive an email once it completes.",
        ),
    };

    PaymentResultTemplate {
        store_name: STORE_NAME,
        cart_key: DEFAULT_CART_KEY,
        clear_cart: status.clears_cart(),
        heading,
        message,
        retry: status == RedirectStatus::Failed,
        payment_intent: query.payment_intent.filter(|id| !id.is_empty()),
    }
}
