//! Integration tests for the tracking webhook endpoint.
//!
//! Drives the router with in-memory orders and checks both the plain-text
//! acknowledgement and the stored tracking fields.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use waybill_api::{create_router, AppState, ServerLimits};
use waybill_core::{
    CarrierResolver, InMemoryOrderStore, IngestPolicy, Ingestor, LineItem, NoOpDiagnosticSink,
    Order, OrderId, TrackingRecord,
};

fn app_with(store: &InMemoryOrderStore, policy: IngestPolicy) -> Router {
    let ingestor = Ingestor::new(
        Arc::new(store.clone()),
        CarrierResolver::default(),
        Arc::new(NoOpDiagnosticSink::new()),
        policy,
    );
    create_router(AppState::new(ingestor))
}

async fn store_with_order_7() -> InMemoryOrderStore {
    let store = InMemoryOrderStore::new();
    store.insert_order(Order::new(7, vec![LineItem::physical("Espresso machine")])).await;
    store
}

fn webhook_request(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

fn transaction_updated(metadata: &str, number: &str, url: &str) -> String {
    json!({
        "data": {
            "metadata": metadata,
            "tracking_number": number,
            "tracking_url_provider": url,
        }
    })
    .to_string()
}

#[tokio::test]
async fn valid_update_is_stored_and_acknowledged() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy::default());

    let body = transaction_updated("Order 7", "1Z999", "https://www.ups.com/track?tracknum=1Z999");
    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_text(response).await, "ok - tracking info added.");

    let order = store.order(OrderId(7)).await.expect("order 7 exists");
    assert_eq!(
        order.tracking,
        TrackingRecord::new("1Z999", "https://www.ups.com/track?tracknum=1Z999")
    );
}

#[tokio::test]
async fn legacy_path_behaves_like_current_path() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy::default());

    let body = transaction_updated("Order #7", "9400", "https://tools.usps.com/go/track?l=9400");
    let response = app
        .oneshot(webhook_request("/shippo/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok - tracking info added.");
    assert_eq!(store.recorded_writes().await.len(), 1);
}

#[tokio::test]
async fn unknown_order_is_acknowledged_without_write() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy::default());

    let body = transaction_updated("Order 999999", "1Z999", "https://www.ups.com/t");
    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Failed - invalid order.");
    assert!(store.recorded_writes().await.is_empty());
}

#[tokio::test]
async fn unknown_order_is_rejected_under_strict_policy() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy { always_acknowledge: false });

    let body = transaction_updated("Order 999999", "1Z999", "https://www.ups.com/t");
    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Failed - invalid order.");
}

#[tokio::test]
async fn missing_fields_leave_order_untouched() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy { always_acknowledge: false });

    let body = json!({ "data": { "metadata": "Order 7", "tracking_number": "1Z999" } }).to_string();
    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(response).await, "Failed - missing fields.");

    let order = store.order(OrderId(7)).await.expect("order 7 exists");
    assert_eq!(order.tracking, TrackingRecord::default());
}

#[tokio::test]
async fn non_json_body_is_acknowledged_as_malformed() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy::default());

    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", "not json"))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Failed - malformed payload.");
}

#[tokio::test]
async fn store_failure_asks_provider_to_retry() {
    let store = store_with_order_7().await;
    store.fail_writes("connection reset").await;
    let app = app_with(&store, IngestPolicy::default());

    let body = transaction_updated("Order 7", "1Z999", "https://www.ups.com/t");
    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Failed - could not store tracking info.");
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let store = store_with_order_7().await;
    let ingestor = Ingestor::new(
        Arc::new(store.clone()),
        CarrierResolver::default(),
        Arc::new(NoOpDiagnosticSink::new()),
        IngestPolicy::default(),
    );
    let limits = ServerLimits { request_timeout: Duration::from_secs(5), max_payload_bytes: 64 };
    let app = create_router(AppState::new(ingestor).with_limits(limits));

    let body = transaction_updated("Order 7", &"1".repeat(128), "https://www.ups.com/t");
    let response = app
        .oneshot(webhook_request("/tracking/v1/transaction-updated", body))
        .await
        .expect("failed to make request");

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.recorded_writes().await.is_empty());
}

#[tokio::test]
async fn get_on_webhook_path_is_not_allowed() {
    let store = store_with_order_7().await;
    let app = app_with(&store, IngestPolicy::default());

    let request = Request::builder()
        .method("GET")
        .uri("/tracking/v1/transaction-updated")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.expect("failed to make request");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
