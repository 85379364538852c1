//! Application state shared across handlers.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::StorefrontConfig;
use crate::db::{OrderRepository, OutboxRepository};
use crate::payments::{PaymentProvider, WebhookVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. External services sit behind
/// trait objects so tests can run the full router against in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    payments: Arc<dyn PaymentProvider>,
    orders: Arc<dyn OrderRepository>,
    outbox: Arc<dyn OutboxRepository>,
    verifier: WebhookVerifier,
    outbox_notify: Arc<Notify>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration; the webhook verifier is built from its secret
    /// * `payments` - Payment provider client
    /// * `orders` - Order store
    /// * `outbox` - Email outbox store
    /// * `outbox_notify` - Wakes the outbox worker after new messages are committed
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        payments: Arc<dyn PaymentProvider>,
        orders: Arc<dyn OrderRepository>,
        outbox: Arc<dyn OutboxRepository>,
        outbox_notify: Arc<Notify>,
    ) -> Self {
        let verifier = WebhookVerifier::new(
            config.stripe.webhook_secret.clone(),
            config.stripe.webhook_tolerance,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                payments,
                orders,
                outbox,
                verifier,
                outbox_notify,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.payments.as_ref()
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderRepository {
        self.inner.orders.as_ref()
    }

    #[must_use]
    pub fn outbox(&self) -> &dyn OutboxRepository {
        self.inner.outbox.as_ref()
    }

    #[must_use]
    pub fn webhook_verifier(&self) -> &WebhookVerifier {
        &self.inner.verifier
    }

    /// Wake the outbox worker.
    pub fn notify_outbox(&self) {
        self.inner.outbox_notify.notify_one();
    }
}
