//! Payment intent route for the embedded payment form.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::checkout::{PaymentIntentRequest, payment_intent_params};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

/// Create a payment intent and hand its client secret to the page.
///
/// # Errors
///
/// - 400 for a non-positive amount, sub-cent amount or zero quantity
/// - 500 with the provider's message if intent creation fails
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: std::result::Result<Json<PaymentIntentRequest>, JsonRejection>,
) -> Result<Json<PaymentIntentResponse>> {
    let Json(request) = body?;

    let params = payment_intent_params(&request, state.config())?;
    let intent = state.payments().create_payment_intent(&params).await?;

    tracing::info!(payment_intent = %intent.id, amount = params.amount, "Payment intent created");

    let client_secret = intent
        .client_secret
        .ok_or_else(|| AppError::Internal("payment intent has no client secret".to_string()))?;
    Ok(Json(PaymentIntentResponse { client_secret }))
}
