//! End-to-end API flow over the in-memory store: catalog → cart →
//! placement → webhook reconciliation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use store_server::api;
use store_server::gateway::{GatewayError, PaymentGateway, PaymentIntent, WebhookEvent};
use store_server::state::AppState;
use store_server::store::MemStore;

const TEST_SIGNATURE: &str = "test-signature";

/// Gateway double: deterministic intents, shared-secret signature check.
struct TestGateway;

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn create_intent(
        &self,
        _amount_minor_units: i64,
        _currency: &str,
        order_id: i64,
    ) -> Result<PaymentIntent, GatewayError> {
        Ok(PaymentIntent {
            id: format!("pi_test_{order_id}"),
            client_secret: format!("pi_test_{order_id}_secret"),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        if signature_header != TEST_SIGNATURE {
            return Err(GatewayError::SignatureInvalid("Webhook signature mismatch"));
        }
        let event: Value = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::Response(e.to_string()))?;
        let event_type = event["type"].as_str().unwrap_or("").to_string();
        let reference = event["data"]["object"]["id"].as_str().map(String::from);
        match (event_type.as_str(), reference) {
            ("payment_intent.succeeded", Some(reference)) => {
                Ok(WebhookEvent::PaymentSucceeded { reference })
            }
            ("payment_intent.payment_failed", Some(reference)) => {
                Ok(WebhookEvent::PaymentFailed { reference })
            }
            _ => Ok(WebhookEvent::Other { event_type }),
        }
    }
}

fn test_app() -> Router {
    api::create_router(AppState {
        store: Arc::new(MemStore::new()),
        gateway: Arc::new(TestGateway),
        currency: "usd".to_string(),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_request(signature: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("stripe-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Create a product and fill user 1's cart with `quantity` of it.
/// Returns the product id.
async fn seed_catalog_and_cart(app: &Router, stock: i32, quantity: i32) -> i64 {
    let (status, product) = send(
        app,
        json_request(
            "POST",
            "/api/products",
            json!({
                "name": "Widget",
                "description": "A widget",
                "price": "10.00",
                "stock_quantity": stock,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = product["id"].as_i64().unwrap();

    let (status, cart) = send(
        app,
        json_request(
            "POST",
            "/api/cart/1/items",
            json!({ "product_id": product_id, "quantity": quantity }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_items"].as_i64().unwrap(), quantity as i64);

    product_id
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_full_checkout_and_success_webhook() {
    let app = test_app();
    let product_id = seed_catalog_and_cart(&app, 10, 2).await;

    // Place the order
    let (status, placed) = send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = placed["order_id"].as_i64().unwrap();
    let reference = placed["payment_reference"].as_str().unwrap().to_string();
    assert!(placed["payment_client_secret"].as_str().is_some());

    // Stock reserved, cart cleared, order pending
    let (_, product) = send(&app, get(&format!("/api/products/{product_id}"))).await;
    assert_eq!(product["stock_quantity"], 8);
    let (_, cart) = send(&app, get("/api/cart/1")).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    let (_, order) = send(&app, get(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total_amount"], "20.00");

    // Success webhook confirms order and completes payment
    let (status, _) = send(
        &app,
        webhook_request(
            TEST_SIGNATURE,
            json!({
                "type": "payment_intent.succeeded",
                "data": { "object": { "id": reference } },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send(&app, get(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(order["status"], "CONFIRMED");

    let (status, payment) = send(
        &app,
        get(&format!("/api/payments/by-reference?reference={reference}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "COMPLETED");
    assert!(payment["paid_at"].as_i64().is_some());

    // Stock stays decremented after success
    let (_, product) = send(&app, get(&format!("/api/products/{product_id}"))).await;
    assert_eq!(product["stock_quantity"], 8);
}

#[tokio::test]
async fn test_failure_webhook_cancels_and_restores_stock() {
    let app = test_app();
    let product_id = seed_catalog_and_cart(&app, 10, 3).await;

    let (_, placed) = send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;
    let order_id = placed["order_id"].as_i64().unwrap();
    let reference = placed["payment_reference"].as_str().unwrap().to_string();

    let (_, product) = send(&app, get(&format!("/api/products/{product_id}"))).await;
    assert_eq!(product["stock_quantity"], 7);

    let (status, _) = send(
        &app,
        webhook_request(
            TEST_SIGNATURE,
            json!({
                "type": "payment_intent.payment_failed",
                "data": { "object": { "id": reference } },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send(&app, get(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(order["status"], "CANCELLED");
    let (_, payment) = send(
        &app,
        get(&format!("/api/payments/by-order?order_id={order_id}")),
    )
    .await;
    assert_eq!(payment["status"], "FAILED");
    let (_, product) = send(&app, get(&format!("/api/products/{product_id}"))).await;
    assert_eq!(product["stock_quantity"], 10);
}

#[tokio::test]
async fn test_webhook_with_bad_signature_is_rejected() {
    let app = test_app();
    seed_catalog_and_cart(&app, 10, 1).await;

    let (_, placed) = send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;
    let order_id = placed["order_id"].as_i64().unwrap();
    let reference = placed["payment_reference"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        webhook_request(
            "forged",
            json!({
                "type": "payment_intent.succeeded",
                "data": { "object": { "id": reference } },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejected before any state mutation
    let (_, order) = send(&app, get(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(order["status"], "PENDING");
}

#[tokio::test]
async fn test_webhook_missing_signature_header() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrelated_webhook_event_is_acknowledged() {
    let app = test_app();
    let (status, _) = send(
        &app,
        webhook_request(
            TEST_SIGNATURE,
            json!({
                "type": "charge.refunded",
                "data": { "object": { "id": "ch_1" } },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_place_with_insufficient_stock_is_conflict() {
    let app = test_app();
    seed_catalog_and_cart(&app, 5, 100).await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6002);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Widget"));
    assert!(message.contains("Requested: 100"));
    assert!(message.contains("Available: 5"));

    // No order was created
    let (_, orders) = send(&app, get("/api/orders")).await;
    assert_eq!(orders.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_place_with_empty_cart_is_client_error() {
    let app = test_app();
    let (status, body) = send(
        &app,
        json_request("POST", "/api/orders/place/9", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4002);
}

#[tokio::test]
async fn test_direct_payment_notification_endpoints() {
    let app = test_app();
    seed_catalog_and_cart(&app, 10, 1).await;

    let (_, placed) = send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;
    let order_id = placed["order_id"].as_i64().unwrap();
    let reference = placed["payment_reference"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/orders/payment/success",
            json!({ "payment_reference": reference }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send(&app, get(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(order["status"], "CONFIRMED");

    // Unknown reference maps to 404
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/orders/payment/failure",
            json!({ "payment_reference": "pi_unknown" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5001);
}

#[tokio::test]
async fn test_order_queries() {
    let app = test_app();
    seed_catalog_and_cart(&app, 10, 1).await;
    send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;

    let (status, orders) = send(&app, get("/api/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let (status, orders) = send(&app, get("/api/orders/user/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let (status, orders) = send(&app, get("/api/orders/user/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 0);

    let (status, body) = send(&app, get("/api/orders/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

#[tokio::test]
async fn test_admin_status_override() {
    let app = test_app();
    seed_catalog_and_cart(&app, 10, 1).await;
    let (_, placed) = send(
        &app,
        json_request("POST", "/api/orders/place/1", Value::Null),
    )
    .await;
    let order_id = placed["order_id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "CONFIRMED" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send(&app, get(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(order["status"], "CONFIRMED");

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "SHIPPED" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4003);
}

#[tokio::test]
async fn test_cart_endpoints() {
    let app = test_app();
    let product_id = seed_catalog_and_cart(&app, 10, 2).await;

    let (status, cart) = send(&app, get("/api/cart/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_items"], 2);
    assert_eq!(cart["total_amount"], "20.00");
    assert_eq!(cart["items"][0]["product_name"], "Widget");

    // Set quantity
    let (status, cart) = send(
        &app,
        json_request(
            "PUT",
            "/api/cart/1/items",
            json!({ "product_id": product_id, "quantity": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_items"], 5);

    // Remove line
    let (status, cart) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/cart/1/items/{product_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    // Unknown product on add
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/cart/1/items",
            json!({ "product_id": 999, "quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 6001);
}

#[tokio::test]
async fn test_product_crud_and_search() {
    let app = test_app();

    let (status, created) = send(
        &app,
        json_request(
            "POST",
            "/api/products",
            json!({ "name": "Blue Mug", "price": "7.50", "stock_quantity": 3 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    // Duplicate name (case-insensitive) is rejected
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/products",
            json!({ "name": "blue mug", "price": "1.00", "stock_quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4);

    // Invalid price is rejected
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/products",
            json!({ "name": "Freebie", "price": "0.00", "stock_quantity": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Search
    let (status, found) = send(&app, get("/api/products/search?name=mug")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);

    // Update
    let (status, updated) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/products/{id}"),
            json!({ "price": "8.00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], "8.00");

    // Delete
    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/products/{id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/api/products/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
