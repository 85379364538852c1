//! Recording payment provider for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::types::{
    CheckoutSession, CheckoutSessionParams, PaymentIntent, PaymentIntentParams, SessionLineItem,
};
use super::{PaymentError, PaymentProvider};

#[derive(Default)]
struct Inner {
    checkout_calls: Vec<CheckoutSessionParams>,
    intent_calls: Vec<PaymentIntentParams>,
    line_item_calls: Vec<String>,
    line_items: Vec<SessionLineItem>,
    failure: Option<(u16, String)>,
}

/// A [`PaymentProvider`] that records every call and answers with canned data.
#[derive(Default)]
pub struct FakeProvider {
    inner: Mutex<Inner>,
}

impl FakeProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Line items returned by `list_checkout_line_items`.
    #[must_use]
    pub fn with_line_items(self, items: Vec<SessionLineItem>) -> Self {
        self.lock().line_items = items;
        self
    }

    /// Make every call fail with a provider API error.
    pub fn fail_with(&self, status: u16, message: &str) {
        self.lock().failure = Some((status, message.to_owned()));
    }

    #[must_use]
    pub fn checkout_calls(&self) -> Vec<CheckoutSessionParams> {
        self.lock().checkout_calls.clone()
    }

    #[must_use]
    pub fn intent_calls(&self) -> Vec<PaymentIntentParams> {
        self.lock().intent_calls.clone()
    }

    #[must_use]
    pub fn line_item_calls(&self) -> Vec<String> {
        self.lock().line_item_calls.clone()
    }

    fn check_failure(inner: &Inner) -> Result<(), PaymentError> {
        match &inner.failure {
            Some((status, message)) => Err(PaymentError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut inner = self.lock();
        inner.checkout_calls.push(params.clone());
        Self::check_failure(&inner)?;

        let id = format!("cs_test_{}", inner.checkout_calls.len());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.com/c/pay/{id}")),
            id,
        })
    }

    async fn create_payment_intent(
        &self,
        params: &PaymentIntentParams,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut inner = self.lock();
        inner.intent_calls.push(params.clone());
        Self::check_failure(&inner)?;

        let id = format!("pi_test_{}", inner.intent_calls.len());
        Ok(PaymentIntent {
            client_secret: Some(format!("{id}_secret_test")),
            id,
        })
    }

    async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionLineItem>, PaymentError> {
        let mut inner = self.lock();
        inner.line_item_calls.push(session_id.to_owned());
        Self::check_failure(&inner)?;
        Ok(inner.line_items.clone())
    }
}
