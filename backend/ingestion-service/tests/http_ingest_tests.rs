//! HTTP boundary tests for `/v1/events` and `/v1/events/batch`, run against
//! an in-memory transport standing in for Kafka.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use ingestion_service::kafka::{EventPublisher, EventTransport, TransportError};
use ingestion_service::{routes, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MemoryTransport {
    messages: Mutex<Vec<(String, String, Value)>>,
    down: bool,
}

impl MemoryTransport {
    fn unavailable() -> Self {
        Self {
            down: true,
            ..Default::default()
        }
    }

    fn keys(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.down {
            return Err(TransportError::Timeout(Duration::from_millis(100)));
        }
        let value: Value = serde_json::from_slice(payload).expect("payload is JSON");
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), value));
        Ok(())
    }

    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

macro_rules! init_app {
    ($transport:expr) => {{
        let publisher = Arc::new(EventPublisher::new($transport.clone(), "events_raw"));
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(publisher)))
                .app_data(routes::json_config(64 * 1024))
                .configure(routes::configure),
        )
        .await
    }};
}

fn click(tenant: Option<&str>) -> Value {
    let mut body = json!({
        "event_type": "click",
        "timestamp": "2024-01-01T00:00:00Z",
        "properties": {}
    });
    if let Some(t) = tenant {
        body["tenant_id"] = json!(t);
    }
    body
}

#[actix_web::test]
async fn single_event_is_accepted_and_keyed_by_tenant() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events")
        .set_json(click(Some("t1")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"status": "accepted", "queued": true}));

    let messages = transport.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    let (topic, key, value) = &messages[0];
    assert_eq!(topic, "events_raw");
    assert_eq!(key, "t1");
    assert_eq!(value["event_type"], "click");
    assert_eq!(value["tenant_id"], "t1");
    assert_eq!(value["_meta"]["source"], "ingestion-service");
}

#[actix_web::test]
async fn missing_tenant_returns_503() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events")
        .set_json(click(None))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "KAFKA_PUBLISH_FAILED");
    assert_eq!(body["error"]["details"]["event"]["event_type"], "click");
    assert!(transport.keys().is_empty());
}

#[actix_web::test]
async fn blank_tenant_is_treated_as_missing() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events")
        .set_json(click(Some("")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "KAFKA_PUBLISH_FAILED");
    assert!(transport.keys().is_empty());
}

#[actix_web::test]
async fn missing_event_type_returns_400_naming_field() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events")
        .set_json(json!({"properties": {}}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert_eq!(body["error"]["details"]["field"], "event_type");
    assert!(transport.keys().is_empty());
}

#[actix_web::test]
async fn broker_failure_returns_503_with_original_error() {
    let transport = Arc::new(MemoryTransport::unavailable());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events")
        .set_json(click(Some("t1")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "KAFKA_PUBLISH_FAILED");
    assert!(body["error"]["details"]["originalError"]
        .as_str()
        .unwrap()
        .contains("timed out"));
}

#[actix_web::test]
async fn malformed_json_returns_400() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[actix_web::test]
async fn batch_is_accepted_and_preserves_order() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events/batch")
        .set_json(json!({"events": [click(Some("t1")), click(Some("t2")), click(Some("t1"))]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["queued"], true);
    assert_eq!(body["accepted"], 3);
    assert_eq!(transport.keys(), vec!["t1", "t2", "t1"]);
}

#[actix_web::test]
async fn batch_with_invalid_element_names_index() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events/batch")
        .set_json(json!({"events": [click(Some("t1")), {"event_type": "click", "properties": {}}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("index 1"));
    assert_eq!(body["error"]["details"]["field"], "timestamp");
    assert!(transport.keys().is_empty());
}

#[actix_web::test]
async fn empty_batch_returns_400() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events/batch")
        .set_json(json!({"events": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["details"]["field"], "events");
}

#[actix_web::test]
async fn batch_missing_tenant_sends_nothing() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::post()
        .uri("/v1/events/batch")
        .set_json(json!({"events": [click(Some("t1")), click(None)]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(transport.keys().is_empty());
}

#[actix_web::test]
async fn health_is_ok() {
    let transport = Arc::new(MemoryTransport::default());
    let app = init_app!(transport);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
