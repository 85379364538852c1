//! Integration tests for result pages and health checks.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use boho_integration_tests::{TestApp, checkout_completed_event};

#[tokio::test]
async fn test_checkout_success_page_clears_cart() {
    let app = TestApp::new();

    let (status, html) = app.get("/checkout/success?session_id=cs_live_1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Thank you for your order!"));
    assert!(html.contains(r#"removeItem("cart")"#));
}

#[tokio::test]
async fn test_checkout_success_page_shows_recorded_order() {
    let app = TestApp::new();

    let (_, before) = app.get("/checkout/success?session_id=cs_live_1").await;
    assert!(!before.contains("Order total"));

    let (status, _) = app
        .post_signed_event(&checkout_completed_event("evt_1", "cs_live_1"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, after) = app.get("/checkout/success?session_id=cs_live_1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(after.contains("Order total"));
    assert!(after.contains("$248.95"));
    assert!(after.contains("Handcrafted Boho Hoop Earrings x 2"));
}

#[tokio::test]
async fn test_payment_success_page_by_status() {
    let app = TestApp::new();

    let (_, succeeded) = app
        .get("/payment-success?payment_intent=pi_1&redirect_status=succeeded")
        .await;
    assert!(succeeded.contains("Payment successful"));
    assert!(succeeded.contains("removeItem"));

    let (_, failed) = app
        .get("/payment-success?payment_intent=pi_1&redirect_status=failed")
        .await;
    assert!(failed.contains("Payment failed"));
    assert!(!failed.contains("removeItem"));

    let (status, processing) = app.get("/payment-success").await;
    assert_eq!(status, StatusCode::OK);
    assert!(processing.contains("Payment processing"));
}

#[tokio::test]
async fn test_health_checks() {
    let app = TestApp::new();

    assert_eq!(app.get("/health").await, (StatusCode::OK, "ok".to_string()));
    assert_eq!(app.get("/health/ready").await.0, StatusCode::OK);

    app.store.set_fail_writes(true);
    assert_eq!(
        app.get("/health/ready").await.0,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::new();

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::get("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
