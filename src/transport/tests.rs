use super::{router, serve_websocket};
use crate::broker::{BrokerGate, MemoryBroker};
use crate::config::Settings;
use crate::hub::BroadcastHub;
use crate::message::{ApiResponse, Envelope, decode};
use crate::relay::RelayService;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tower::ServiceExt;
use tungstenite::protocol::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(2);

async fn started_relay() -> Arc<RelayService> {
    let broker = MemoryBroker::new();
    let relay = RelayService::new(
        Settings::default().broker,
        broker.backend(),
        BrokerGate::default(),
        Arc::new(BroadcastHub::new()),
    );
    relay.start().await.unwrap();
    Arc::new(relay)
}

async fn call(relay: Arc<RelayService>, request: Request<Body>) -> (StatusCode, ApiResponse) {
    let response = router(relay).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_send(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/kafka/send")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_health_route() {
    let relay = started_relay().await;
    let request = Request::builder()
        .uri("/kafka/health")
        .body(Body::empty())
        .unwrap();

    let (status, response) = call(relay.clone(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, ApiResponse::success("Kafka service is running", None));
    relay.shutdown().await;
}

#[tokio::test]
async fn test_send_route_publishes() {
    let relay = started_relay().await;
    let body = json!({
        "messageId": "m-1",
        "type": "EVENT",
        "timestamp": "2024-05-01T12:30:00",
        "payload": "hello"
    })
    .to_string();

    let (status, response) = call(relay.clone(), post_send(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(response.success);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.message, "Message sent successfully");
    relay.shutdown().await;
}

#[tokio::test]
async fn test_send_route_rejects_malformed_body() {
    let relay = started_relay().await;

    let (status, response) = call(relay.clone(), post_send("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!response.success);
    assert_eq!(response.status_code, 400);
    assert_eq!(response.message, "Error while sending message");
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("error on deserializing message"));
    relay.shutdown().await;
}

#[tokio::test]
async fn test_send_route_rejects_array_body() {
    let relay = started_relay().await;
    let body = json!(["m-1", null, "EVENT"]).to_string();

    let (status, response) = call(relay.clone(), post_send(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!response.success);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_send_route_rejects_non_text_payload() {
    let relay = started_relay().await;
    let body = json!({ "type": "EVENT", "payload": { "nested": true } }).to_string();

    let (status, response) = call(relay.clone(), post_send(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!response.success);
    relay.shutdown().await;
}

#[tokio::test]
async fn test_websocket_session_lifecycle() {
    let hub = Arc::new(BroadcastHub::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_websocket(listener, Arc::clone(&hub)));

    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    wait_until(|| hub.len() == 1).await;

    // inbound frames are ignored, the session stays registered
    ws.send(WsMessage::text("hi".to_string())).await.unwrap();

    let sent = Envelope {
        kind: Some("EVENT".to_string()),
        ..Envelope::new("hello".to_string())
    };
    let report = hub.broadcast(&sent).await;
    assert_eq!(report.delivered, 1);

    let frame = tokio::time::timeout(WAIT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(frame.is_text());
    let received: Envelope<String> = decode(frame.to_text().unwrap().as_bytes());
    assert_eq!(received, sent);

    ws.close(None).await.unwrap();
    wait_until(|| hub.is_empty()).await;
    server.abort();
}
