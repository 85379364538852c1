//! Cart and product input to payment provider parameters.
//!
//! Both checkout paths validate client input before anything is sent to the
//! provider: an invalid request never produces a provider call.

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use boho_core::{CartLineItem, MoneyError, to_minor_units};

use crate::config::StorefrontConfig;
use crate::payments::{CheckoutSessionParams, LineItemParams, PaymentIntentParams, ShippingRate};

/// Placeholder the provider replaces with the session id in the success URL.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Invalid checkout input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Please provide cart items")]
    EmptyCart,

    #[error("Item {index}: quantity must be at least 1")]
    InvalidQuantity { index: usize },

    #[error("Item {index}: {source}")]
    InvalidPrice {
        index: usize,
        #[source]
        source: MoneyError,
    },

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Quantity must be at least 1")]
    InvalidIntentQuantity,
}

/// Body of `POST /create-payment-intent`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    /// Order total in major units, already computed by the page.
    pub amount: Decimal,
    pub product_name: String,
    #[serde(default)]
    pub size: String,
    pub quantity: u32,
}

/// Build hosted checkout parameters for `items`, preserving their order.
///
/// # Errors
///
/// Returns `CheckoutError` if `items` is empty or any line has a zero
/// quantity or a price that falls between two cents. Floating point
/// residue is rounded away.
pub fn checkout_session_params(
    items: &[CartLineItem],
    config: &StorefrontConfig,
) -> Result<CheckoutSessionParams, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let line_items = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if item.quantity == 0 {
                return Err(CheckoutError::InvalidQuantity { index });
            }
            let unit_amount = to_minor_units(item.price)
                .map_err(|source| CheckoutError::InvalidPrice { index, source })?;

            Ok(LineItemParams {
                product_id: item.id.clone(),
                name: item.name.clone(),
                description: Some(format!("Size: {}", item.size)),
                images: vec![absolute_image_url(&config.base_url, &item.image)],
                unit_amount,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CheckoutSessionParams {
        currency: config.stripe.currency,
        line_items,
        success_url: format!(
            "{}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}",
            config.base_url
        ),
        cancel_url: format!("{}/cart", config.base_url),
        allowed_countries: config.checkout.allowed_countries.clone(),
        shipping_rates: vec![ShippingRate::standard(), ShippingRate::express()],
        payment_method_types: vec!["card".to_string()],
    })
}

/// Build payment intent parameters for a single-product purchase.
///
/// # Errors
///
/// Returns `CheckoutError` if the amount is not positive, has sub-cent
/// precision, or the quantity is zero.
pub fn payment_intent_params(
    request: &PaymentIntentRequest,
    config: &StorefrontConfig,
) -> Result<PaymentIntentParams, CheckoutError> {
    if request.amount <= Decimal::ZERO {
        return Err(CheckoutError::NonPositiveAmount);
    }
    if request.quantity == 0 {
        return Err(CheckoutError::InvalidIntentQuantity);
    }

    Ok(PaymentIntentParams {
        amount: to_minor_units(request.amount)?,
        currency: config.stripe.currency,
        description: format!(
            "{} (Size: {}) × {}",
            request.product_name, request.size, request.quantity
        ),
        metadata: vec![
            ("product_name".to_string(), request.product_name.clone()),
            ("size".to_string(), request.size.clone()),
            ("quantity".to_string(), request.quantity.to_string()),
        ],
        automatic_payment_methods: true,
    })
}

/// Root-relative image paths are served by the storefront itself.
#[must_use]
pub fn absolute_image_url(base_url: &str, image: &str) -> String {
    if image.starts_with('/') {
        format!("{base_url}{image}")
    } else {
        image.to_string()
    }
}
