//! Stripe REST API client.
//!
//! Requests are form-encoded with Stripe's bracket syntax
//! (`line_items[0][price_data][unit_amount]=8900`) and authenticated with
//! the secret key as a bearer token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::types::{
    CheckoutSession, CheckoutSessionParams, ListPage, PaymentIntent, PaymentIntentParams,
    SessionLineItem,
};
use super::{PaymentError, PaymentProvider};
use crate::config::StripeConfig;

/// Line items fetched per request.
const LINE_ITEMS_PAGE_SIZE: &str = "100";

/// Error body returned by the provider on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| PaymentError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| PaymentError::Parse(format!("invalid API base: {}", self.api_base)))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("payment provider returned {status}"));
            tracing::warn!(status = %status, message = %message, "Payment provider rejected request");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip_all, fields(line_items = params.line_items.len()))]
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = self.endpoint(&["checkout", "sessions"])?;
        let session: CheckoutSession = self
            .send(self.client.post(url).form(&checkout_session_form(params)))
            .await?;

        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    #[instrument(skip_all, fields(amount = params.amount))]
    async fn create_payment_intent(
        &self,
        params: &PaymentIntentParams,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = self.endpoint(&["payment_intents"])?;
        let intent: PaymentIntent = self
            .send(self.client.post(url).form(&payment_intent_form(params)))
            .await?;

        tracing::info!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionLineItem>, PaymentError> {
        let mut items = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut url = self.endpoint(&["checkout", "sessions", session_id, "line_items"])?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("limit", LINE_ITEMS_PAGE_SIZE)
                    .append_pair("expand[]", "data.price.product");
                if let Some(cursor) = &starting_after {
                    query.append_pair("starting_after", cursor);
                }
            }

            let page: ListPage<SessionLineItem> = self.send(self.client.get(url)).await?;
            starting_after = next_cursor(&page)?;
            items.extend(page.data);

            if starting_after.is_none() {
                break;
            }
            tracing::debug!(session_id, fetched = items.len(), "Fetching next line item page");
        }

        Ok(items)
    }
}

/// Cursor for the page after `page`, or `None` if it was the last.
///
/// A page that claims more results but has no line id to continue from is
/// a parse error, never a truncated list.
fn next_cursor(page: &ListPage<SessionLineItem>) -> Result<Option<String>, PaymentError> {
    if !page.has_more {
        return Ok(None);
    }

    page.data
        .last()
        .and_then(|item| item.id.clone())
        .map(Some)
        .ok_or_else(|| PaymentError::Parse("line item page has more results but no cursor".to_string()))
}

/// Encode checkout session parameters as form fields.
fn checkout_session_form(params: &CheckoutSessionParams) -> Vec<(String, String)> {
    let currency = params.currency.as_provider_str();
    let mut form = Vec::new();

    for (i, method) in params.payment_method_types.iter().enumerate() {
        form.push((format!("payment_method_types[{i}]"), method.clone()));
    }
    form.push(("mode".to_string(), "payment".to_string()));
    form.push(("success_url".to_string(), params.success_url.clone()));
    form.push(("cancel_url".to_string(), params.cancel_url.clone()));

    for (i, item) in params.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((format!("{prefix}[price_data][currency]"), currency.to_string()));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(description) = &item.description {
            form.push((
                format!("{prefix}[price_data][product_data][description]"),
                description.clone(),
            ));
        }
        for (j, image) in item.images.iter().enumerate() {
            form.push((
                format!("{prefix}[price_data][product_data][images][{j}]"),
                image.clone(),
            ));
        }
        form.push((
            format!("{prefix}[price_data][product_data][metadata][product_id]"),
            item.product_id.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    for (i, country) in params.allowed_countries.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            country.clone(),
        ));
    }

    for (i, rate) in params.shipping_rates.iter().enumerate() {
        let prefix = format!("shipping_options[{i}][shipping_rate_data]");
        form.push((format!("{prefix}[type]"), "fixed_amount".to_string()));
        form.push((
            format!("{prefix}[fixed_amount][amount]"),
            rate.amount.to_string(),
        ));
        form.push((format!("{prefix}[fixed_amount][currency]"), currency.to_string()));
        form.push((format!("{prefix}[display_name]"), rate.display_name.clone()));
        for (bound, value) in [
            ("minimum", rate.min_business_days),
            ("maximum", rate.max_business_days),
        ] {
            form.push((
                format!("{prefix}[delivery_estimate][{bound}][unit]"),
                "business_day".to_string(),
            ));
            form.push((
                format!("{prefix}[delivery_estimate][{bound}][value]"),
                value.to_string(),
            ));
        }
    }

    form
}

/// Encode payment intent parameters as form fields.
fn payment_intent_form(params: &PaymentIntentParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), params.amount.to_string()),
        (
            "currency".to_string(),
            params.currency.as_provider_str().to_string(),
        ),
        ("description".to_string(), params.description.clone()),
    ];

    for (key, value) in &params.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    if params.automatic_payment_methods {
        form.push((
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ));
    }

    form
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use boho_core::CurrencyCode;

    use super::*;
    use crate::payments::types::{LineItemParams, ShippingRate};

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn session_params() -> CheckoutSessionParams {
        CheckoutSessionParams {
            currency: CurrencyCode::USD,
            line_items: vec![
                LineItemParams {
                    product_id: "boho-hoop-earrings".to_string(),
                    name: "Handcrafted Boho Hoop Earrings".to_string(),
                    description: Some("Size: One Size".to_string()),
                    images: vec!["https://bohobaha.com/hoops.jpg".to_string()],
                    unit_amount: 8900,
                    quantity: 2,
                },
                LineItemParams {
                    product_id: "gift-box".to_string(),
                    name: "Gift Box".to_string(),
                    description: None,
                    images: Vec::new(),
                    unit_amount: 500,
                    quantity: 1,
                },
            ],
            success_url: "https://bohobaha.com/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://bohobaha.com/cart".to_string(),
            allowed_countries: vec!["US".to_string(), "CA".to_string()],
            shipping_rates: vec![ShippingRate::standard(), ShippingRate::express()],
            payment_method_types: vec!["card".to_string()],
        }
    }

    #[test]
    fn test_checkout_session_form_line_items() {
        let form = checkout_session_form(&session_params());

        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "payment_method_types[0]"), Some("card"));
        assert_eq!(
            field(&form, "line_items[0][price_data][unit_amount]"),
            Some("8900")
        );
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            field(&form, "line_items[0][price_data][product_data][images][0]"),
            Some("https://bohobaha.com/hoops.jpg")
        );
        assert_eq!(
            field(
                &form,
                "line_items[0][price_data][product_data][metadata][product_id]"
            ),
            Some("boho-hoop-earrings")
        );
        assert_eq!(
            field(&form, "line_items[1][price_data][unit_amount]"),
            Some("500")
        );
        assert_eq!(
            field(&form, "line_items[1][price_data][product_data][description]"),
            None
        );
    }

    #[test]
    fn test_checkout_session_form_shipping() {
        let form = checkout_session_form(&session_params());

        assert_eq!(
            field(&form, "shipping_address_collection[allowed_countries][1]"),
            Some("CA")
        );
        assert_eq!(
            field(
                &form,
                "shipping_options[0][shipping_rate_data][fixed_amount][amount]"
            ),
            Some("995")
        );
        assert_eq!(
            field(
                &form,
                "shipping_options[1][shipping_rate_data][delivery_estimate][minimum][value]"
            ),
            Some("2")
        );
        assert_eq!(
            field(
                &form,
                "shipping_options[1][shipping_rate_data][delivery_estimate][maximum][unit]"
            ),
            Some("business_day")
        );
    }

    #[test]
    fn test_payment_intent_form() {
        let form = payment_intent_form(&PaymentIntentParams {
            amount: 8900,
            currency: CurrencyCode::USD,
            description: "Handcrafted Boho Hoop Earrings (Size: One Size) × 1".to_string(),
            metadata: vec![("quantity".to_string(), "1".to_string())],
            automatic_payment_methods: true,
        });

        assert_eq!(field(&form, "amount"), Some("8900"));
        assert_eq!(field(&form, "currency"), Some("usd"));
        assert_eq!(field(&form, "metadata[quantity]"), Some("1"));
        assert_eq!(field(&form, "automatic_payment_methods[enabled]"), Some("true"));
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let client = StripeClient::new(&StripeConfig {
            api_base: "http://localhost:12111".to_string(),
            secret_key: SecretString::from("sk_test_51NzQv8Kp2Lm"),
            webhook_secret: SecretString::from("whsec_9fJ2kLmQ7xR"),
            currency: CurrencyCode::USD,
            webhook_tolerance: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let url = client
            .endpoint(&["checkout", "sessions", "cs_test/1", "line_items"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:12111/v1/checkout/sessions/cs_test%2F1/line_items"
        );
    }

    fn page(ids: &[Option<&str>], has_more: bool) -> ListPage<SessionLineItem> {
        let data = ids
            .iter()
            .map(|id| {
                serde_json::from_value(serde_json::json!({ "id": id, "amount_total": 8900 }))
                    .unwrap()
            })
            .collect();
        ListPage { data, has_more }
    }

    #[test]
    fn test_next_cursor_follows_last_line() {
        assert_eq!(
            next_cursor(&page(&[Some("li_1"), Some("li_2")], true)).unwrap(),
            Some("li_2".to_string())
        );
        assert_eq!(next_cursor(&page(&[Some("li_1")], false)).unwrap(), None);
    }

    #[test]
    fn test_next_cursor_without_line_id_is_an_error() {
        assert!(matches!(
            next_cursor(&page(&[Some("li_1"), None], true)),
            Err(PaymentError::Parse(_))
        ));
        assert!(matches!(next_cursor(&page(&[], true)), Err(PaymentError::Parse(_))));
    }
}
