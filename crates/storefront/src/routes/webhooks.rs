//! Payment provider webhook route.
//!
//! The raw body is verified against the `stripe-signature` header before
//! anything is parsed. Handling is synchronous: a 500 makes the provider
//! redeliver, and redelivery is safe because order writes are idempotent.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::Result;
use crate::payments::{SIGNATURE_HEADER, decode_event};
use crate::services::webhook::handle_event;
use crate::state::AppState;

/// Receive a payment event.
///
/// # Errors
///
/// - 400 if the signature is missing or invalid, or the event is malformed
/// - 500 if line items can't be fetched or the order can't be saved
#[instrument(skip_all)]
pub async fn payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state.webhook_verifier().verify_now(&body, signature)?;
    let event = decode_event(&body)?;

    let outcome = handle_event(&state, event).await?;
    tracing::debug!(?outcome, "Webhook handled");

    Ok(Json(json!({ "received": true })))
}
