//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database)
//!
//! # Checkout
//! POST /checkout                - Create a hosted checkout session
//! POST /create-payment-intent   - Create a payment intent for the embedded form
//!
//! # Provider callbacks
//! POST /webhooks/payment        - Signed payment events
//!
//! # Result pages
//! GET  /checkout/success        - After hosted checkout
//! GET  /payment-success         - After the embedded form redirect
//! ```

pub mod checkout;
pub mod health;
pub mod pages;
pub mod payment_intent;
pub mod webhooks;

use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/checkout", post(checkout::create_session))
        .route("/create-payment-intent", post(payment_intent::create))
        .route("/webhooks/payment", post(webhooks::payment))
        .route("/checkout/success", get(pages::checkout_success))
        .route("/payment-success", get(pages::payment_success))
}

/// Build the full application router with tracing and request ids.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
