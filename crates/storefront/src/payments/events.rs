//! Webhook event decoding.
//!
//! Decoding happens in two steps. The envelope (`id`, `type`,
//! `data.object`) is parsed first; the object is then decoded into the
//! struct for that event type. Unknown types keep only their name, and a
//! known type whose object doesn't match its shape is an error rather than
//! a partially-filled event.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::types::{ListPage, SessionLineItem};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// Errors decoding a verified webhook body.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("invalid event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("invalid {event_type} object: {source}")]
    Object {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutSessionCompleted {
        event_id: String,
        session: CheckoutSessionCompleted,
    },
    PaymentIntentSucceeded {
        event_id: String,
        intent: PaymentIntentObject,
    },
    PaymentIntentFailed {
        event_id: String,
        intent: PaymentIntentObject,
    },
    /// Any type this storefront doesn't act on.
    Other { event_id: String, event_type: String },
}

impl WebhookEvent {
    /// Provider event id (`evt_...`).
    #[must_use]
    pub fn event_id(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted { event_id, .. }
            | Self::PaymentIntentSucceeded { event_id, .. }
            | Self::PaymentIntentFailed { event_id, .. }
            | Self::Other { event_id, .. } => event_id,
        }
    }

    /// Provider event type string.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted { .. } => CHECKOUT_SESSION_COMPLETED,
            Self::PaymentIntentSucceeded { .. } => PAYMENT_INTENT_SUCCEEDED,
            Self::PaymentIntentFailed { .. } => PAYMENT_INTENT_FAILED,
            Self::Other { event_type, .. } => event_type,
        }
    }
}

/// The session object of a `checkout.session.completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSessionCompleted {
    pub id: String,
    /// Total charged in minor units, shipping included.
    pub amount_total: i64,
    pub currency: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Present only when the event was configured to expand line items.
    #[serde(default)]
    pub line_items: Option<ListPage<SessionLineItem>>,
}

impl CheckoutSessionCompleted {
    /// Email collected on the hosted page, else the one the session was created with.
    #[must_use]
    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    #[must_use]
    pub fn customer_name(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The object of `payment_intent.*` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub receipt_email: Option<String>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub message: Option<String>,
}

/// Decode a verified webhook body.
///
/// # Errors
///
/// Returns `EventDecodeError` if the envelope is malformed or a known event
/// type carries an object of the wrong shape.
pub fn decode_event(payload: &[u8]) -> Result<WebhookEvent, EventDecodeError> {
    let envelope: Envelope = serde_json::from_slice(payload).map_err(EventDecodeError::Envelope)?;
    let Envelope {
        id: event_id,
        event_type,
        data,
    } = envelope;

    let event = match event_type.as_str() {
        CHECKOUT_SESSION_COMPLETED => WebhookEvent::CheckoutSessionCompleted {
            session: decode_object(&event_type, data.object)?,
            event_id,
        },
        PAYMENT_INTENT_SUCCEEDED => WebhookEvent::PaymentIntentSucceeded {
            intent: decode_object(&event_type, data.object)?,
            event_id,
        },
        PAYMENT_INTENT_FAILED => WebhookEvent::PaymentIntentFailed {
            intent: decode_object(&event_type, data.object)?,
            event_id,
        },
        _ => WebhookEvent::Other {
            event_id,
            event_type,
        },
    };

    Ok(event)
}

fn decode_object<T: DeserializeOwned>(
    event_type: &str,
    object: serde_json::Value,
) -> Result<T, EventDecodeError> {
    serde_json::from_value(object).map_err(|source| EventDecodeError::Object {
        event_type: event_type.to_string(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn test_decode_checkout_session_completed() {
        let payload = body(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "amount_total": 24895,
                "currency": "usd",
                "customer_email": null,
                "customer_details": { "email": "jane@example.com", "name": "Jane Doe" },
                "payment_status": "paid"
            }}
        }));

        let event = decode_event(&payload).unwrap();
        assert_eq!(event.event_id(), "evt_1");
        assert_eq!(event.event_type(), CHECKOUT_SESSION_COMPLETED);

        let WebhookEvent::CheckoutSessionCompleted { session, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(session.amount_total, 24895);
        assert_eq!(session.customer_email(), Some("jane@example.com"));
        assert_eq!(session.customer_name(), Some("Jane Doe"));
        assert!(session.line_items.is_none());
    }

    #[test]
    fn test_customer_email_falls_back_to_session_email() {
        let session: CheckoutSessionCompleted = serde_json::from_value(json!({
            "id": "cs_1",
            "amount_total": 100,
            "currency": "usd",
            "customer_email": "jane@example.com",
            "customer_details": { "email": null, "name": "" }
        }))
        .unwrap();

        assert_eq!(session.customer_email(), Some("jane@example.com"));
        assert_eq!(session.customer_name(), None);
    }

    #[test]
    fn test_decode_payment_failed() {
        let payload = body(&json!({
            "id": "evt_2",
            "type": "payment_intent.payment_failed",
            "data": { "object": {
                "id": "pi_1",
                "amount": 8900,
                "receipt_email": "jane@example.com",
                "last_payment_error": { "message": "Your card was declined." }
            }}
        }));

        let WebhookEvent::PaymentIntentFailed { intent, .. } = decode_event(&payload).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(intent.receipt_email.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn test_unknown_type_is_other() {
        let payload = body(&json!({
            "id": "evt_3",
            "type": "customer.created",
            "data": { "object": { "anything": true } }
        }));

        assert_eq!(
            decode_event(&payload).unwrap(),
            WebhookEvent::Other {
                event_id: "evt_3".to_string(),
                event_type: "customer.created".to_string(),
            }
        );
    }

    #[test]
    fn test_known_type_with_wrong_shape_fails() {
        let payload = body(&json!({
            "id": "evt_4",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1", "amount_total": "lots" } }
        }));

        assert!(matches!(
            decode_event(&payload),
            Err(EventDecodeError::Object { .. })
        ));
    }

    #[test]
    fn test_malformed_envelope_fails() {
        assert!(matches!(
            decode_event(b"not json"),
            Err(EventDecodeError::Envelope(_))
        ));
        assert!(matches!(
            decode_event(br#"{"id":"evt_5","type":"x"}"#),
            Err(EventDecodeError::Envelope(_))
        ));
    }
}
