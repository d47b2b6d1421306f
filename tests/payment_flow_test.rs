//! End-to-end checkout tests: order intent creation, payment order
//! minting through the mocked gateway, and signed callback
//! verification, including the negative paths a gateway never sees.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{simple_order_body, TestApp, TEST_RAZORPAY_SECRET};
use storefront_api::services::signature::compute_signature;

#[tokio::test]
async fn create_payment_order_returns_checkout_fields() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());

    let (status, body) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": 999.5 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 99_950);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["keyId"], common::TEST_RAZORPAY_KEY_ID);
    assert!(body["orderId"].as_str().unwrap().starts_with("order_test_"));
    assert!(body["userId"].is_string());
    // The secret must never appear in anything sent to the browser.
    assert!(!body.to_string().contains(TEST_RAZORPAY_SECRET));
    assert_eq!(app.gateway.calls(), 1);
}

#[tokio::test]
async fn caller_receipt_and_notes_reach_the_gateway() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let token = app.customer_token(user_id);

    let (status, _) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({
                "amount": 250,
                "receipt": "rcpt_caller_42",
                "notes": { "campaign": "festive" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.gateway.last_request().expect("gateway call recorded");
    assert_eq!(sent.receipt, "rcpt_caller_42");
    // Caller notes survive, with the caller's identity stamped over.
    assert_eq!(sent.notes["campaign"], "festive");
    assert_eq!(sent.notes["user_id"], user_id.to_string());

    // Without a caller receipt one is generated.
    let (status, _) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": 250 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let sent = app.gateway.last_request().unwrap();
    assert!(sent.receipt.starts_with("rcpt_"));
}

#[tokio::test]
async fn zero_amount_is_rejected_before_the_gateway() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());

    let (status, body) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": 0 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("amount must be greater than zero"));
    assert_eq!(app.gateway.calls(), 0);

    let (status, _) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": -12.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn unauthenticated_order_creation_never_reaches_the_gateway() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post_json("/api/v1/payments/orders", None, json!({ "amount": 100 }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.gateway.calls(), 0);

    let (status, _) = app
        .post_json(
            "/api/v1/payments/orders",
            Some("not-a-jwt"),
            json!({ "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn verification_needs_no_bearer_token() {
    // The callback is authenticated by its signature alone.
    let app = TestApp::new().await;

    let payment_id = "pay_tokenless";
    let signature = compute_signature("order_tokenless", payment_id, TEST_RAZORPAY_SECRET);
    let (status, body) = app
        .post_json(
            "/api/v1/payments/verify",
            None,
            json!({
                "razorpay_order_id": "order_tokenless",
                "razorpay_payment_id": payment_id,
                "razorpay_signature": signature
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["paymentId"], payment_id);
}

#[tokio::test]
async fn fractional_amounts_reach_the_gateway_in_exact_minor_units() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());

    for (amount, expected_minor) in [(999.5, 99_950), (1000.33, 100_033), (49999.99, 4_999_999)] {
        let (status, body) = app
            .post_json(
                "/api/v1/payments/orders",
                Some(&token),
                json!({ "amount": amount }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], expected_minor, "amount {amount}");
    }
    assert_eq!(app.gateway.calls(), 3);
}

#[tokio::test]
async fn full_checkout_flow_confirms_the_order() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let token = app.customer_token(customer_id);

    // 1. Create a pending order intent.
    let (status, order) = app
        .post_json("/api/v1/orders", Some(&token), simple_order_body(99_950, 1))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_minor"], 99_950);
    let order_id = order["id"].as_str().unwrap().to_string();

    // 2. Mint the provider-side payment order.
    let (status, payment_order) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": 999.5, "order_id": order_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let provider_order_id = payment_order["orderId"].as_str().unwrap().to_string();

    // 3. Post back the signed callback.
    let payment_id = "pay_e2e_123";
    let signature = compute_signature(&provider_order_id, payment_id, TEST_RAZORPAY_SECRET);
    let (status, body) = app
        .post_json(
            "/api/v1/payments/verify",
            None,
            json!({
                "razorpay_order_id": provider_order_id,
                "razorpay_payment_id": payment_id,
                "razorpay_signature": signature,
                "order_id": order_id
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["paymentId"], payment_id);
    assert_eq!(body["orderStatus"], "confirmed");

    // 4. The intent is confirmed with the payment reference recorded.
    let (status, order) = app
        .get(&format!("/api/v1/orders/{order_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["provider_payment_id"], payment_id);
    assert_eq!(order["provider_order_id"], provider_order_id);
}

#[tokio::test]
async fn flipped_signature_is_rejected_and_order_stays_pending() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());

    let (_, order) = app
        .post_json("/api/v1/orders", Some(&token), simple_order_body(50_000, 1))
        .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let payment_id = "pay_tampered";
    let good = compute_signature("order_test_1", payment_id, TEST_RAZORPAY_SECRET);
    // Swap the first two hex characters so length and alphabet stay valid.
    let mut chars: Vec<char> = good.chars().collect();
    chars.swap(0, 1);
    let tampered: String = chars.into_iter().collect();
    assert_ne!(tampered, good);

    let (status, body) = app
        .post_json(
            "/api/v1/payments/verify",
            None,
            json!({
                "razorpay_order_id": "order_test_1",
                "razorpay_payment_id": payment_id,
                "razorpay_signature": tampered,
                "order_id": order_id
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["verified"], false);
    assert_eq!(body["error"], "payment signature verification failed");
    assert!(body.get("paymentId").is_none());

    let (_, order) = app
        .get(&format!("/api/v1/orders/{order_id}"), Some(&token))
        .await;
    assert_eq!(order["status"], "pending");
    assert!(order["provider_payment_id"].is_null());
}

#[tokio::test]
async fn incomplete_callback_gets_the_failure_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post_json(
            "/api/v1/payments/verify",
            None,
            json!({
                "razorpay_order_id": "order_x",
                "razorpay_payment_id": "pay_x"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["verified"], false);
    assert_eq!(body["error"], "missing required callback fields");

    let (status, body) = app
        .post_json("/api/v1/payments/verify", None, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["verified"], false);
}

#[tokio::test]
async fn double_verification_is_idempotent() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());

    let (_, order) = app
        .post_json("/api/v1/orders", Some(&token), simple_order_body(25_000, 2))
        .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let payment_id = "pay_replay";
    let signature = compute_signature("order_replay", payment_id, TEST_RAZORPAY_SECRET);
    let callback = json!({
        "razorpay_order_id": "order_replay",
        "razorpay_payment_id": payment_id,
        "razorpay_signature": signature,
        "order_id": order_id
    });

    let (status, body) = app
        .post_json("/api/v1/payments/verify", None, callback.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["orderStatus"], "confirmed");

    // Replaying the identical callback succeeds without changing state.
    let (status, body) = app
        .post_json("/api/v1/payments/verify", None, callback)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["paymentId"], payment_id);
    assert_eq!(body["orderStatus"], "confirmed");

    let (_, order) = app
        .get(&format!("/api/v1/orders/{order_id}"), Some(&token))
        .await;
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["provider_payment_id"], payment_id);
}

#[tokio::test]
async fn verification_succeeds_even_when_the_order_is_missing() {
    // A valid signature with a dangling order reference must still
    // report success; the money moved, reconciliation handles the rest.
    let app = TestApp::new().await;

    let payment_id = "pay_orphan";
    let signature = compute_signature("order_orphan", payment_id, TEST_RAZORPAY_SECRET);
    let (status, body) = app
        .post_json(
            "/api/v1/payments/verify",
            None,
            json!({
                "razorpay_order_id": "order_orphan",
                "razorpay_payment_id": payment_id,
                "razorpay_signature": signature,
                "order_id": Uuid::new_v4()
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["paymentId"], payment_id);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("confirmation pending"));
}

#[tokio::test]
async fn missing_gateway_config_is_a_server_error() {
    let app = TestApp::without_payment_config().await;
    let token = app.customer_token(Uuid::new_v4());

    let (status, body) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Service is not configured for payments");
    assert_eq!(app.gateway.calls(), 0);

    // Verification reports through its own envelope.
    let (status, body) = app
        .post_json(
            "/api/v1/payments/verify",
            None,
            json!({
                "razorpay_order_id": "order_x",
                "razorpay_payment_id": "pay_x",
                "razorpay_signature": "00"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["verified"], false);
    assert_eq!(body["error"], "Service is not configured for payments");
}

#[tokio::test]
async fn gateway_client_errors_pass_through_to_the_caller() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    app.gateway
        .fail_next_with(400, "Order amount less than minimum amount allowed");

    let (status, body) = app
        .post_json(
            "/api/v1/payments/orders",
            Some(&token),
            json!({ "amount": 0.001 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Order amount less than minimum amount allowed"));
}
