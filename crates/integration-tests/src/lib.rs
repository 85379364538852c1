//! Integration tests for the Boho Baha storefront.
//!
//! The full axum router runs in-process against the in-memory store, the
//! recording payment provider and the recording mailer, so no database,
//! network or SMTP server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p boho-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use secrecy::SecretString;
use tokio::sync::Notify;
use tower::ServiceExt;

use boho_core::{CurrencyCode, Email};
use boho_storefront::config::{
    CheckoutConfig, EmailConfig, OutboxConfig, StorefrontConfig, StripeConfig,
};
use boho_storefront::db::MemoryStore;
use boho_storefront::payments::{FakeProvider, SIGNATURE_HEADER, WebhookVerifier};
use boho_storefront::routes;
use boho_storefront::services::{OutboxWorker, RecordingMailer};
use boho_storefront::state::AppState;

/// Webhook signing secret shared by the app and the tests.
pub const WEBHOOK_SECRET: &str = "whsec_test_Qm7vX2pL9kR4tZ8w";

/// Configuration pointing at nothing real.
///
/// # Panics
///
/// Panics if the hard-coded addresses fail to parse.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/boho_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "https://bohobaha.test".to_string(),
        stripe: StripeConfig {
            api_base: "https://api.stripe.invalid".to_string(),
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            currency: CurrencyCode::USD,
            webhook_tolerance: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
        },
        checkout: CheckoutConfig::default(),
        email: EmailConfig {
            smtp_host: "smtp.bohobaha.test".to_string(),
            smtp_port: 587,
            smtp_username: "orders".to_string(),
            smtp_password: SecretString::from("smtp-password"),
            from_address: "Boho Baha <orders@bohobaha.test>".to_string(),
            admin_address: Email::parse("owner@bohobaha.test").unwrap(),
        },
        outbox: OutboxConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A router wired to in-memory doubles, plus handles on those doubles.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub mailer: Arc<RecordingMailer>,
    pub notify: Arc<Notify>,
    verifier: WebhookVerifier,
    config: StorefrontConfig,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(FakeProvider::new())
    }

    #[must_use]
    pub fn with_provider(provider: FakeProvider) -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let notify = Arc::new(Notify::new());

        let state = AppState::new(
            config.clone(),
            provider.clone(),
            store.clone(),
            store.clone(),
            notify.clone(),
        );

        Self {
            router: routes::app(state),
            store,
            provider,
            mailer: Arc::new(RecordingMailer::new()),
            notify,
            verifier: WebhookVerifier::new(
                SecretString::from(WEBHOOK_SECRET),
                config.stripe.webhook_tolerance,
            ),
            config,
        }
    }

    /// An outbox worker over this app's store and mailer.
    #[must_use]
    pub fn worker(&self) -> OutboxWorker {
        OutboxWorker::new(
            self.store.clone(),
            self.mailer.clone(),
            self.notify.clone(),
            self.config.outbox.clone(),
        )
    }

    /// Send a request and collect the status and body.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body can't be read.
    #[allow(clippy::unwrap_used)]
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// # Panics
    ///
    /// Panics if the request can't be built or the response isn't JSON.
    #[allow(clippy::unwrap_used)]
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, text) = self.send(request).await;
        (status, serde_json::from_str(&text).unwrap())
    }

    /// # Panics
    ///
    /// Panics if the request can't be built.
    #[allow(clippy::unwrap_used)]
    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Post a webhook body with the given signature header (if any).
    ///
    /// # Panics
    ///
    /// Panics if the request can't be built or the response isn't JSON.
    #[allow(clippy::unwrap_used)]
    pub async fn post_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::post("/webhooks/payment");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        let (status, text) = self
            .send(request.body(Body::from(body.to_vec())).unwrap())
            .await;
        (status, serde_json::from_str(&text).unwrap())
    }

    /// Post a correctly signed webhook event.
    ///
    /// # Panics
    ///
    /// Panics if signing fails.
    #[allow(clippy::unwrap_used)]
    pub async fn post_signed_event(
        &self,
        event: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let body = event.to_string();
        let signature = self.verifier.sign(body.as_bytes(), unix_now()).unwrap();
        self.post_webhook(body.as_bytes(), Some(&signature)).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// A `checkout.session.completed` event with embedded line items.
#[must_use]
pub fn checkout_completed_event(event_id: &str, session_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "object": "checkout.session",
            "amount_total": 24895,
            "currency": "usd",
            "customer_email": null,
            "customer_details": { "email": "jane@example.com", "name": "Jane Doe" },
            "payment_status": "paid",
            "line_items": {
                "object": "list",
                "has_more": false,
                "data": [{
                    "description": "Handcrafted Boho Hoop Earrings",
                    "quantity": 2,
                    "amount_total": 17800,
                    "price": {
                        "id": "price_hoops",
                        "unit_amount": 8900,
                        "product": {
                            "id": "prod_hoops",
                            "name": "Handcrafted Boho Hoop Earrings",
                            "metadata": { "product_id": "boho-hoop-earrings" }
                        }
                    }
                }]
            }
        }}
    })
}
