//! Ingestion pipeline tests against the in-memory order store.
//!
//! Covers every terminal state, the acknowledgement policy and diagnostic
//! emission without any network or database dependency.

use std::{collections::HashMap, sync::Arc, time::Duration};

use http::StatusCode;
use serde_json::json;
use tokio::sync::mpsc;
use waybill_core::{
    CarrierResolver, DiagnosticRecord, DiagnosticSink, InMemoryOrderStore, IngestOutcome,
    IngestPolicy, Ingestor, LineItem, NoOpDiagnosticSink, Order, OrderId, TrackingError,
    TrackingRecord,
};

#[derive(Debug)]
struct ChannelSink {
    tx: mpsc::UnboundedSender<DiagnosticRecord>,
}

#[async_trait::async_trait]
impl DiagnosticSink for ChannelSink {
    async fn emit(&self, record: DiagnosticRecord) {
        let _ = self.tx.send(record);
    }
}

async fn store_with_order(id: u64) -> InMemoryOrderStore {
    let store = InMemoryOrderStore::new();
    store.insert_order(Order::new(id, vec![LineItem::physical("Kettle")])).await;
    store
}

fn ingestor(store: &InMemoryOrderStore, policy: IngestPolicy) -> Ingestor {
    Ingestor::new(
        Arc::new(store.clone()),
        CarrierResolver::default(),
        Arc::new(NoOpDiagnosticSink::new()),
        policy,
    )
}

fn payload(metadata: &str, number: &str, url: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "data": {
            "metadata": metadata,
            "tracking_number": number,
            "tracking_url_provider": url,
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn valid_update_persists_both_fields() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());

    let outcome = ingestor
        .ingest(&payload("Order 7", "1Z999", "https://www.ups.com/track?1Z999"), &HashMap::new())
        .await;

    let IngestOutcome::Persisted { order_id, ref carrier, .. } = outcome else {
        panic!("expected persisted, got {outcome:?}");
    };
    assert_eq!(order_id, OrderId(7));
    assert_eq!(carrier.as_deref(), Some("UPS"));

    let order = store.order(OrderId(7)).await.unwrap();
    assert_eq!(order.tracking, TrackingRecord::new("1Z999", "https://www.ups.com/track?1Z999"));

    let ack = ingestor.acknowledge(&outcome);
    assert_eq!(ack.status, StatusCode::OK);
    assert_eq!(ack.body, "ok - tracking info added.");
}

#[tokio::test]
async fn resending_same_update_is_idempotent() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());
    let body = payload("Order 7", "1Z999", "https://www.ups.com/track?1Z999");

    assert!(ingestor.ingest(&body, &HashMap::new()).await.is_persisted());
    let first = store.order(OrderId(7)).await.unwrap();
    assert!(ingestor.ingest(&body, &HashMap::new()).await.is_persisted());
    let second = store.order(OrderId(7)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.recorded_writes().await.len(), 2);
}

#[tokio::test]
async fn later_update_overwrites_earlier_one() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());

    ingestor.ingest(&payload("Order 7", "OLD", "https://www.ups.com/old"), &HashMap::new()).await;
    ingestor
        .ingest(&payload("Order 7", "NEW", "https://www.fedex.com/new"), &HashMap::new())
        .await;

    let order = store.order(OrderId(7)).await.unwrap();
    assert_eq!(order.tracking, TrackingRecord::new("NEW", "https://www.fedex.com/new"));
}

#[tokio::test]
async fn unknown_order_writes_nothing() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());

    let outcome = ingestor
        .ingest(&payload("Order 999999", "1Z999", "https://www.ups.com/t"), &HashMap::new())
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(TrackingError::OrderNotFound { order_id: 999_999, .. })
    ));
    assert!(store.recorded_writes().await.is_empty());

    let ack = ingestor.acknowledge(&outcome);
    assert_eq!(ack.status, StatusCode::OK);
    assert_eq!(ack.body, "Failed - invalid order.");
}

#[tokio::test]
async fn metadata_without_digits_is_unresolvable() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());

    let outcome =
        ingestor.ingest(&payload("Order", "1Z999", "https://www.ups.com/t"), &HashMap::new()).await;

    assert!(matches!(outcome, IngestOutcome::Failed(TrackingError::UnresolvableOrderReference { .. })));
    assert!(store.recorded_writes().await.is_empty());
}

#[tokio::test]
async fn order_reference_above_bigint_range_is_acknowledged_not_retried() {
    let store = store_with_order(7).await;

    for always_acknowledge in [true, false] {
        let ingestor = ingestor(&store, IngestPolicy { always_acknowledge });
        let outcome = ingestor
            .ingest(
                &payload("Order 9223372036854775808", "1Z999", "https://www.ups.com/t"),
                &HashMap::new(),
            )
            .await;

        let error = outcome.error().expect("out of range reference");
        assert!(matches!(error, TrackingError::UnresolvableOrderReference { .. }));
        assert!(!error.is_retryable());

        let ack = ingestor.acknowledge(&outcome);
        let expected =
            if always_acknowledge { StatusCode::OK } else { StatusCode::UNPROCESSABLE_ENTITY };
        assert_eq!(ack.status, expected);
        assert_eq!(ack.body, "Failed - invalid order.");
    }
    assert!(store.recorded_writes().await.is_empty());
}

#[tokio::test]
async fn sanitization_failure_stores_neither_field() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());

    let bad_number = ingestor.ingest(&payload("Order 7", "``\n", "https://www.ups.com/t"), &HashMap::new()).await;
    let bad_url = ingestor.ingest(&payload("Order 7", "1Z999", "not a url"), &HashMap::new()).await;

    assert!(matches!(bad_number, IngestOutcome::Failed(TrackingError::SanitizationFailed { .. })));
    assert!(matches!(bad_url, IngestOutcome::Failed(TrackingError::SanitizationFailed { .. })));
    assert_eq!(store.order(OrderId(7)).await.unwrap().tracking, TrackingRecord::default());
}

#[tokio::test]
async fn malformed_payload_is_acknowledged() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy::default());

    let outcome = ingestor.ingest(b"<xml/>", &HashMap::new()).await;

    assert!(matches!(outcome, IngestOutcome::Failed(TrackingError::MalformedPayload { .. })));
    assert_eq!(ingestor.acknowledge(&outcome).status, StatusCode::OK);
}

#[tokio::test]
async fn strict_policy_reports_failure_statuses() {
    let store = store_with_order(7).await;
    let ingestor = ingestor(&store, IngestPolicy { always_acknowledge: false });

    let not_found = ingestor
        .ingest(&payload("Order 8", "1Z999", "https://www.ups.com/t"), &HashMap::new())
        .await;
    let missing = ingestor.ingest(br#"{"data":{}}"#, &HashMap::new()).await;
    let malformed = ingestor.ingest(b"", &HashMap::new()).await;

    assert_eq!(ingestor.acknowledge(&not_found).status, StatusCode::NOT_FOUND);
    assert_eq!(ingestor.acknowledge(&missing).status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(ingestor.acknowledge(&malformed).status, StatusCode::BAD_REQUEST);
    assert_eq!(ingestor.acknowledge(&missing).body, "Failed - missing fields.");
}

#[tokio::test]
async fn store_failure_is_never_acknowledged_as_ok() {
    for always_acknowledge in [true, false] {
        let store = store_with_order(7).await;
        store.fail_writes("connection reset").await;
        let ingestor = ingestor(&store, IngestPolicy { always_acknowledge });

        let outcome = ingestor
            .ingest(&payload("Order 7", "1Z999", "https://www.ups.com/t"), &HashMap::new())
            .await;

        let error = outcome.error().expect("store failure");
        assert!(error.is_retryable());
        assert_eq!(ingestor.acknowledge(&outcome).status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[tokio::test]
async fn every_call_emits_one_diagnostic() {
    let store = store_with_order(7).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ingestor = Ingestor::new(
        Arc::new(store.clone()),
        CarrierResolver::default(),
        Arc::new(ChannelSink { tx }),
        IngestPolicy::default(),
    );
    let headers = HashMap::from([("x-shippo-event".to_string(), "track_updated".to_string())]);

    ingestor.ingest(&payload("Order 7", "1Z999", "https://www.ups.com/t"), &headers).await;
    ingestor.ingest(b"garbage", &headers).await;

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    let mut outcomes = vec![first.outcome.clone(), second.outcome.clone()];
    outcomes.sort();

    assert_eq!(outcomes, vec!["E1001".to_string(), "persisted".to_string()]);
    assert_eq!(first.headers.get("x-shippo-event").map(String::as_str), Some("track_updated"));
    let persisted = if first.is_success() { &first } else { &second };
    assert_eq!(persisted.order_id, Some(7));
    assert!(persisted.message.contains("1Z999"));
    let malformed = if first.is_success() { &second } else { &first };
    assert_eq!(malformed.body, "garbage");

    assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}
