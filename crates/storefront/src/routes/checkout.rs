//! Hosted checkout session route.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use boho_core::CartLineItem;

use crate::error::{AppError, Result};
use crate::services::checkout::checkout_session_params;
use crate::state::AppState;

/// Body of `POST /checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Option<Vec<CartLineItem>>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Create a hosted checkout session for the posted cart.
///
/// # Errors
///
/// - 400 if the cart is missing, empty or has an invalid line
/// - 500 with the provider's message if session creation fails
#[instrument(skip(state, body))]
pub async fn create_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let Json(request) = body?;
    let items = request.items.unwrap_or_default();

    let params = checkout_session_params(&items, state.config())?;
    let session = state.payments().create_checkout_session(&params).await?;

    tracing::info!(
        checkout_session_id = %session.id,
        lines = params.line_items.len(),
        "Checkout session created"
    );

    let url = session
        .url
        .ok_or_else(|| AppError::Internal("checkout session has no url".to_string()))?;
    Ok(Json(CheckoutResponse { url }))
}
