//! Integration tests for the checkout and payment intent endpoints.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use boho_integration_tests::TestApp;

// =============================================================================
// POST /checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_returns_hosted_url() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json(
            "/checkout",
            &json!({ "items": [{
                "id": "boho-hoop-earrings",
                "name": "Handcrafted Boho Hoop Earrings",
                "price": 89.00,
                "size": "One Size",
                "quantity": 2,
                "image": "/images/hoops.jpg"
            }]}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test_1");

    let calls = app.provider.checkout_calls();
    assert_eq!(calls.len(), 1);
    let line = &calls[0].line_items[0];
    assert_eq!(line.unit_amount, 8900);
    assert_eq!(line.quantity, 2);
    assert_eq!(line.images, ["https://bohobaha.test/images/hoops.jpg"]);
}

#[tokio::test]
async fn test_checkout_preserves_line_order() {
    let app = TestApp::new();
    let item = |id: &str, price: f64, quantity: u32| {
        json!({
            "id": id, "name": id, "price": price, "size": "",
            "quantity": quantity, "image": "https://cdn.bohobaha.test/x.jpg"
        })
    };

    let (status, _) = app
        .post_json(
            "/checkout",
            &json!({ "items": [item("c", 19.95, 1), item("a", 89.0, 3), item("b", 0.5, 2)] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let lines: Vec<_> = app.provider.checkout_calls()[0]
        .line_items
        .iter()
        .map(|l| (l.product_id.clone(), l.unit_amount, l.quantity))
        .collect();
    assert_eq!(
        lines,
        [
            ("c".to_string(), 1995, 1),
            ("a".to_string(), 8900, 3),
            ("b".to_string(), 50, 2)
        ]
    );
}

#[tokio::test]
async fn test_empty_or_missing_items_rejected_without_provider_call() {
    let app = TestApp::new();

    for body in [json!({ "items": [] }), json!({}), json!({ "items": null })] {
        let (status, response) = app.post_json("/checkout", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "Please provide cart items");
    }

    assert!(app.provider.checkout_calls().is_empty());
}

#[tokio::test]
async fn test_float_residue_prices_are_rounded() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json(
            "/checkout",
            &json!({ "items": [{
                "id": "a", "name": "A", "price": 0.300_000_000_000_000_04, "size": "",
                "quantity": 1, "image": "/a.jpg"
            }]}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.provider.checkout_calls()[0].line_items[0].unit_amount, 30);
}

#[tokio::test]
async fn test_half_cent_price_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json(
            "/checkout",
            &json!({ "items": [{
                "id": "a", "name": "A", "price": 10.005, "size": "",
                "quantity": 1, "image": "/a.jpg"
            }]}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.provider.checkout_calls().is_empty());
}

#[tokio::test]
async fn test_provider_error_message_passed_through() {
    let app = TestApp::new();
    app.provider.fail_with(400, "Invalid API Key provided");

    let (status, body) = app
        .post_json(
            "/checkout",
            &json!({ "items": [{
                "id": "a", "name": "A", "price": 10, "size": "",
                "quantity": 1, "image": "/a.jpg"
            }]}),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid API Key provided");
}

// =============================================================================
// POST /create-payment-intent
// =============================================================================

#[tokio::test]
async fn test_payment_intent_returns_client_secret() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json(
            "/create-payment-intent",
            &json!({
                "amount": 178.00,
                "productName": "Handcrafted Boho Hoop Earrings",
                "size": "One Size",
                "quantity": 2
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientSecret"], "pi_test_1_secret_test");

    let calls = app.provider.intent_calls();
    assert_eq!(calls[0].amount, 17800);
    assert_eq!(
        calls[0].description,
        "Handcrafted Boho Hoop Earrings (Size: One Size) × 2"
    );
}

#[tokio::test]
async fn test_payment_intent_rounds_browser_total() {
    let app = TestApp::new();

    // A total computed in browser floating point.
    let (status, body) = app
        .post_json(
            "/create-payment-intent",
            &json!({
                "amount": 89.100_000_000_000_01,
                "productName": "Handcrafted Boho Hoop Earrings",
                "size": "One Size",
                "quantity": 3
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(app.provider.intent_calls()[0].amount, 8910);
}

#[tokio::test]
async fn test_payment_intent_rejects_zero_amount() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json(
            "/create-payment-intent",
            &json!({ "amount": 0, "productName": "Earrings", "size": "", "quantity": 1 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.provider.intent_calls().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json("/create-payment-intent", &json!({ "amount": "lots" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
