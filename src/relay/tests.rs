use super::service::{HEALTHY, MAY_BE_DELIVERED, SEND_FAILED, SEND_OK, SEND_UNCONFIRMED};
use super::RelayService;
use crate::broker::{
    BrokerBackend, BrokerGate, DeliveryFuture, MemoryBroker, OutboundRecord, ProducerClient,
    RunnerState,
};
use crate::client::Client;
use crate::config::{BrokerSettings, Settings};
use crate::hub::BroadcastHub;
use crate::message::{ApiResponse, Envelope, decode};
use crate::utils::RelayError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn settings() -> BrokerSettings {
    Settings::default().broker
}

fn relay(broker: &MemoryBroker, gate: BrokerGate) -> RelayService {
    RelayService::new(settings(), broker.backend(), gate, Arc::new(BroadcastHub::new()))
}

fn event(payload: &str) -> Envelope<String> {
    Envelope {
        kind: Some("EVENT".to_string()),
        ..Envelope::new(payload.to_string())
    }
}

#[tokio::test]
async fn test_start_creates_topic_and_runs_subscription() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    assert!(!relay.topic_exists("notifications").await);

    relay.start().await.unwrap();

    assert!(relay.topic_exists("notifications").await);
    assert_eq!(broker.partition_count("notifications"), Some(3));
    assert_eq!(broker.replication_factor("notifications"), Some(1));
    assert_eq!(relay.subscription_state().await, RunnerState::Running);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    relay.start().await.unwrap();

    let err = relay.start().await.unwrap_err();
    assert!(matches!(err, RelayError::AlreadyRunning(_)));
    assert_eq!(relay.subscription_state().await, RunnerState::Running);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_published_event_reaches_sessions() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    relay.start().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    relay.hub().register(Arc::new(Client::new(tx)));

    let sent = event("hello");
    relay.publish(&sent).unwrap().await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let received: Envelope<String> = decode(frame.to_text().unwrap().as_bytes());
    assert_eq!(received, sent);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_publish_uses_a_fresh_key_per_call() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    relay.start().await.unwrap();

    relay.publish(&event("a")).unwrap().await.unwrap();
    relay.publish(&event("b")).unwrap().await.unwrap();

    let records = broker.records("notifications");
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].key, records[1].key);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_send_message_success_response() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    relay.start().await.unwrap();

    let response = relay.send_message(event("hello")).await;
    assert_eq!(response, ApiResponse::success(SEND_OK, None));
    assert_eq!(response.status_code, 200);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_send_message_failure_is_a_400_response() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    // never started: the topic does not exist

    let response = relay.send_message(event("hello")).await;
    assert!(!response.success);
    assert_eq!(response.status_code, 400);
    assert_eq!(response.message, SEND_FAILED);
    assert_eq!(
        response.errors,
        Some(vec!["unknown topic 'notifications'".to_string()])
    );
}

/// Accepts every record and never acknowledges it.
struct StalledProducer;

impl ProducerClient for StalledProducer {
    fn send(&self, _record: OutboundRecord) -> DeliveryFuture {
        Box::pin(futures::future::pending())
    }
}

#[tokio::test]
async fn test_send_message_timeout_warns_of_possible_delivery() {
    let broker = MemoryBroker::new();
    let backend = BrokerBackend {
        producer: Arc::new(StalledProducer),
        ..broker.backend()
    };
    let mut settings = settings();
    settings.delivery_timeout_ms = 50;
    let relay = RelayService::new(settings, backend, BrokerGate::default(), Arc::new(BroadcastHub::new()));

    let response = relay.send_message(event("hello")).await;

    assert!(!response.success);
    assert_eq!(response.status_code, 400);
    assert_eq!(response.message, SEND_UNCONFIRMED);
    assert_eq!(
        response.errors,
        Some(vec![
            "publish timed out after 50ms".to_string(),
            MAY_BE_DELIVERED.to_string(),
        ])
    );
}

#[tokio::test]
async fn test_disabled_relay_touches_nothing() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::new(false));

    relay.start().await.unwrap();
    let response = relay.send_message(event("hello")).await;

    assert!(response.success);
    assert_eq!(relay.subscription_state().await, RunnerState::Stopped);
    assert_eq!(broker.operations(), 0);
    assert_eq!(broker.partition_count("notifications"), None);
}

#[tokio::test]
async fn test_admin_operations_pass_through() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());

    relay.create_topic("orders", 4, 1).await.unwrap();
    assert_eq!(broker.partition_count("orders"), Some(4));

    relay.clear_topic("orders").await.unwrap();
    assert_eq!(broker.partition_count("orders"), Some(1));

    relay.delete_topic("orders").await.unwrap();
    assert!(!relay.topic_exists("orders").await);
}

#[tokio::test]
async fn test_shutdown_stops_subscription() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    relay.start().await.unwrap();

    relay.shutdown().await;
    assert_eq!(relay.subscription_state().await, RunnerState::Stopped);
    // restartable after shutdown
    relay.start().await.unwrap();
    assert_eq!(relay.subscription_state().await, RunnerState::Running);
    relay.shutdown().await;
}

#[test]
fn test_health() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, BrokerGate::default());
    let response = relay.health();
    assert!(response.success);
    assert_eq!(response.message, HEALTHY);
    assert_eq!(response.data, None);
}
