//! Request and response types for the payment provider API.

use std::collections::HashMap;

use serde::Deserialize;

use boho_core::CurrencyCode;

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    pub currency: CurrencyCode,
    /// Lines in cart order.
    pub line_items: Vec<LineItemParams>,
    /// Redirect after payment; contains the `{CHECKOUT_SESSION_ID}` placeholder.
    pub success_url: String,
    /// Redirect when the shopper backs out.
    pub cancel_url: String,
    /// Two-letter codes accepted for the shipping address.
    pub allowed_countries: Vec<String>,
    pub shipping_rates: Vec<ShippingRate>,
    pub payment_method_types: Vec<String>,
}

/// One product line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemParams {
    /// Storefront product id, stored in the provider product's metadata.
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Absolute image URLs.
    pub images: Vec<String>,
    /// Unit price in minor units.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// A fixed-amount shipping option offered on the hosted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingRate {
    pub display_name: String,
    /// Fee in minor units.
    pub amount: i64,
    pub min_business_days: u32,
    pub max_business_days: u32,
}

impl ShippingRate {
    /// $9.95, 5-7 business days.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            display_name: "Standard Shipping".to_string(),
            amount: 995,
            min_business_days: 5,
            max_business_days: 7,
        }
    }

    /// $19.95, 2-3 business days.
    #[must_use]
    pub fn express() -> Self {
        Self {
            display_name: "Express Shipping".to_string(),
            amount: 1995,
            min_business_days: 2,
            max_business_days: 3,
        }
    }
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page URL. Absent once the session has expired or completed.
    pub url: Option<String>,
}

/// Parameters for a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentParams {
    /// Amount in minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub description: String,
    /// Sent as `metadata[key]=value`, in order.
    pub metadata: Vec<(String, String)>,
    pub automatic_payment_methods: bool,
}

/// A created payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

/// A line item of a completed checkout session, as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionLineItem {
    /// Provider line id (`li_...`), the pagination cursor.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Line total in minor units.
    pub amount_total: i64,
    #[serde(default)]
    pub price: Option<LinePrice>,
}

impl SessionLineItem {
    /// Storefront product id.
    ///
    /// Prefers the `product_id` metadata set at session creation, then the
    /// provider's product id, then the price id.
    #[must_use]
    pub fn product_id(&self) -> Option<&str> {
        let price = self.price.as_ref()?;
        match &price.product {
            Some(Expandable::Object(product)) => Some(
                product
                    .metadata
                    .get("product_id")
                    .map_or(product.id.as_str(), String::as_str),
            ),
            Some(Expandable::Id(id)) => Some(id.as_str()),
            None => Some(price.id.as_str()),
        }
    }

    /// Display name: the line description, or the expanded product's name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.description.as_deref().or_else(|| {
            match self.price.as_ref()?.product.as_ref()? {
                Expandable::Object(product) => Some(product.name.as_str()),
                Expandable::Id(_) => None,
            }
        })
    }
}

/// The price object of a line item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinePrice {
    pub id: String,
    #[serde(default)]
    pub product: Option<Expandable<ProductObject>>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
}

/// A field the provider returns as either an id or the expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(T),
}

/// An expanded product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One page of a provider list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_prefers_metadata() {
        let item: SessionLineItem = serde_json::from_value(serde_json::json!({
            "description": "Handcrafted Boho Hoop Earrings",
            "quantity": 2,
            "amount_total": 17800,
            "price": {
                "id": "price_1",
                "unit_amount": 8900,
                "product": {
                    "id": "prod_1",
                    "name": "Handcrafted Boho Hoop Earrings",
                    "metadata": { "product_id": "boho-hoop-earrings" }
                }
            }
        }))
        .unwrap();

        assert_eq!(item.product_id(), Some("boho-hoop-earrings"));
        assert_eq!(item.name(), Some("Handcrafted Boho Hoop Earrings"));
    }

    #[test]
    fn test_product_id_falls_back_to_product_reference() {
        let item: SessionLineItem = serde_json::from_value(serde_json::json!({
            "quantity": 1,
            "amount_total": 8900,
            "price": { "id": "price_1", "product": "prod_1" }
        }))
        .unwrap();

        assert_eq!(item.product_id(), Some("prod_1"));
        assert_eq!(item.name(), None);
    }

    #[test]
    fn test_shipping_rates() {
        assert_eq!(ShippingRate::standard().amount, 995);
        assert_eq!(ShippingRate::express().amount, 1995);
        assert_eq!(ShippingRate::express().max_business_days, 3);
    }
}
