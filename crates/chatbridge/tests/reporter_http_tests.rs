use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chatbridge::extractor::{ExtractedMessage, MessageKind};
use chatbridge::reporter::deliver_with_retry;
use chatbridge::{BridgeError, HttpTransport, ReportingPipeline, RetryPolicy};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Receiver that answers 503 for the first `failures` requests.
#[derive(Clone)]
struct Receiver {
    failures: usize,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn receive(State(receiver): State<Receiver>, Json(body): Json<Value>) -> StatusCode {
    let mut bodies = receiver.bodies.lock();
    bodies.push(body);
    if bodies.len() <= receiver.failures {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn start_receiver(failures: usize) -> (String, Arc<Mutex<Vec<Value>>>) {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/wechat/receive", post(receive))
        .with_state(Receiver {
            failures,
            bodies: Arc::clone(&bodies),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/wechat/receive"), bodies)
}

fn message() -> ExtractedMessage {
    ExtractedMessage {
        contact: "Alice".to_string(),
        kind: MessageKind::Text,
        content: "are you there?".to_string(),
        timestamp: "2024-05-01T09:30:00".to_string(),
        is_self: false,
        trigger_reply: true,
        native_id: Some("42.7.1".to_string()),
    }
}

#[tokio::test]
async fn test_delivered_on_third_attempt_after_two_503s() {
    let (url, bodies) = start_receiver(2).await;
    let transport = HttpTransport::new(url, Duration::from_secs(5)).unwrap();
    let policy = RetryPolicy::new(3, 0.01);

    let attempts = deliver_with_retry(&transport, &policy, &message()).await.unwrap();

    assert_eq!(attempts, 3);
    assert_eq!(bodies.lock().len(), 3);
}

#[tokio::test]
async fn test_payload_shape() {
    let (url, bodies) = start_receiver(0).await;
    let transport = HttpTransport::new(url, Duration::from_secs(5)).unwrap();
    deliver_with_retry(&transport, &RetryPolicy::new(0, 0.0), &message())
        .await
        .unwrap();

    let body = bodies.lock()[0].clone();
    assert_eq!(body["contact"], "Alice");
    assert_eq!(body["type"], "text");
    assert_eq!(body["content"], "are you there?");
    assert_eq!(body["is_self"], false);
    assert_eq!(body["trigger_reply"], true);
    assert_eq!(body["ui_id"], "42.7.1");
    assert_eq!(body["timestamp"], "2024-05-01T09:30:00");
}

#[tokio::test]
async fn test_exhausted_retries_report_the_status() {
    let (url, bodies) = start_receiver(usize::MAX).await;
    let transport = HttpTransport::new(url, Duration::from_secs(5)).unwrap();
    let err = deliver_with_retry(&transport, &RetryPolicy::new(1, 0.01), &message())
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Delivery(ref m) if m.contains("503")));
    assert_eq!(bodies.lock().len(), 2);
}

#[tokio::test]
async fn test_pipeline_drains_queue_before_stopping() {
    let (url, bodies) = start_receiver(1).await;
    let transport = HttpTransport::new(url, Duration::from_secs(5)).unwrap();
    let (handle, worker) = ReportingPipeline::spawn(transport, RetryPolicy::new(3, 0.01));

    handle.submit(message());
    let mut second = message();
    second.content = "hello?".to_string();
    handle.submit(second);
    handle.stop();
    worker.await.unwrap();

    let contents: Vec<_> = bodies
        .lock()
        .iter()
        .map(|b| b["content"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(contents, vec!["are you there?", "are you there?", "hello?"]);
}

#[tokio::test]
async fn test_unreachable_receiver_is_a_delivery_error() {
    let transport =
        HttpTransport::new("http://127.0.0.1:9/receive", Duration::from_millis(500)).unwrap();
    let result = deliver_with_retry(&transport, &RetryPolicy::new(0, 0.0), &message()).await;
    assert!(result.is_err());
}
