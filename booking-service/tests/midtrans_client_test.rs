use booking_service::config::{GatewayConfig, GatewayEnvironment};
use booking_service::services::{GatewayError, MidtransClient, PaymentGateway, TransactionRequest};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("SB-Mid-server-test:")
const BASIC_AUTH: &str = "Basic U0ItTWlkLXNlcnZlci10ZXN0Og==";

fn client_for(server: &MockServer, timeout_seconds: u64) -> MidtransClient {
    let mut config = GatewayConfig::new("SB-Mid-server-test", GatewayEnvironment::Sandbox);
    config.snap_base_url = server.uri();
    config.api_base_url = server.uri();
    config.timeout_seconds = timeout_seconds;
    MidtransClient::new(config).expect("Failed to build client")
}

fn request(order_id: &str) -> TransactionRequest {
    TransactionRequest {
        order_id: order_id.to_string(),
        gross_amount: 200_000,
        customer_name: "Budi".to_string(),
        customer_email: "budi@example.com".to_string(),
        item_name: "Booking Lapangan Futsal A - 02 Jan 2030 09:00".to_string(),
    }
}

#[tokio::test]
async fn create_transaction_posts_snap_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({
            "transaction_details": { "order_id": "order-1", "gross_amount": 200000 },
            "customer_details": { "first_name": "Budi", "email": "budi@example.com" },
            "item_details": [{ "id": "order-1", "price": 200000, "quantity": 1 }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "snap-token",
            "redirect_url": "https://app.sandbox.midtrans.com/snap/v4/redirection/snap-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hosted = client_for(&server, 5)
        .create_transaction(&request("order-1"))
        .await
        .expect("Failed to create transaction");
    assert_eq!(hosted.token, "snap-token");
    assert!(hosted.redirect_url.ends_with("/snap-token"));
}

#[tokio::test]
async fn create_transaction_surfaces_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error_messages": ["Access denied due to unauthorized transaction"]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, 5)
        .create_transaction(&request("order-2"))
        .await
        .unwrap_err();
    match err {
        GatewayError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("unauthorized transaction"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "token": "t", "redirect_url": "u" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server, 1)
        .create_transaction(&request("order-3"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn transaction_status_reads_core_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/order-4/status"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_code": "200",
            "transaction_id": "b7a3c2d1-txn",
            "order_id": "order-4",
            "gross_amount": "200000.00",
            "payment_type": "bank_transfer",
            "transaction_status": "settlement",
            "fraud_status": "accept"
        })))
        .mount(&server)
        .await;

    let status = client_for(&server, 5)
        .transaction_status("order-4")
        .await
        .expect("Failed to read status");
    assert_eq!(status.transaction_id, "b7a3c2d1-txn");
    assert_eq!(status.transaction_status, "settlement");
    assert_eq!(status.payment_type.as_deref(), Some("bank_transfer"));
}

#[tokio::test]
async fn unknown_order_reported_in_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/order-5/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_code": "404",
            "status_message": "Transaction doesn't exist."
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, 5)
        .transaction_status("order-5")
        .await
        .unwrap_err();
    match err {
        GatewayError::Rejected { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Transaction doesn't exist.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
