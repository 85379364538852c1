//! Payment provider integration.
//!
//! The storefront talks to a Stripe-compatible REST API for three things:
//! creating hosted checkout sessions, creating payment intents for the
//! embedded form, and listing a completed session's line items. Handlers
//! depend on the [`PaymentProvider`] trait so tests can swap in
//! `FakeProvider`.
//!
//! Inbound webhooks are verified by [`webhook::WebhookVerifier`] and decoded
//! by [`events::decode_event`].

pub mod events;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod stripe;
pub mod types;
pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;

pub use events::{
    CheckoutSessionCompleted, EventDecodeError, PaymentIntentObject, WebhookEvent, decode_event,
};
#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeProvider;
pub use stripe::StripeClient;
pub use types::{
    CheckoutSession, CheckoutSessionParams, LineItemParams, PaymentIntent, PaymentIntentParams,
    SessionLineItem, ShippingRate,
};
pub use webhook::{SIGNATURE_HEADER, SignatureError, WebhookVerifier};

/// Errors from payment provider calls.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request never produced a response (connect failure, timeout).
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request. Displays the provider's own message.
    #[error("{message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider-supplied error message.
        message: String,
    },

    /// The provider answered with something we could not parse.
    #[error("unexpected payment provider response: {0}")]
    Parse(String),
}

/// Operations the storefront needs from the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session and return its id and redirect URL.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider call fails.
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Create a payment intent and return its client secret.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider call fails.
    async fn create_payment_intent(
        &self,
        params: &PaymentIntentParams,
    ) -> Result<PaymentIntent, PaymentError>;

    /// List the line items of a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider call fails.
    async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionLineItem>, PaymentError>;
}
