//! `POST /v1/events` and `POST /v1/events/batch`.
//!
//! Validation runs first, then publishing. Either failure is returned
//! unchanged so the boundary can map it (400 / 503). There are no retries
//! here; a 503 is the caller's signal to retry.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::kafka::EventPublisher;
use crate::metrics::record_events;
use crate::validation::{validate_batch, validate_single};
use crate::AppState;

/// Acknowledgement: the request is durably on the log, not yet in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestAck {
    pub status: &'static str,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<usize>,
}

impl IngestAck {
    fn single() -> Self {
        Self {
            status: "accepted",
            queued: true,
            accepted: None,
        }
    }

    fn batch(count: usize) -> Self {
        Self {
            status: "accepted",
            queued: true,
            accepted: Some(count),
        }
    }
}

/// Validate and publish one event
pub async fn ingest_event(
    publisher: &EventPublisher,
    body: &Value,
    received_at: DateTime<Utc>,
) -> Result<IngestAck> {
    let event = validate_single(body)?;
    publisher.publish(&event, received_at).await?;

    info!(
        event_type = %event.event_type,
        tenant_id = event.tenant_id.as_deref().unwrap_or_default(),
        project_id = event.project_id.as_deref().unwrap_or_default(),
        "Accepted single event"
    );
    Ok(IngestAck::single())
}

/// Validate every element, then publish the batch as a unit
pub async fn ingest_batch(
    publisher: &EventPublisher,
    body: &Value,
    received_at: DateTime<Utc>,
) -> Result<IngestAck> {
    let batch = validate_batch(body)?;
    let count = publisher.publish_batch(&batch.events, received_at).await?;

    info!(count, "Accepted event batch");
    Ok(IngestAck::batch(count))
}

pub async fn post_event(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> std::result::Result<HttpResponse, IngestError> {
    let received_at = Utc::now();
    let outcome = ingest_event(&state.publisher, &body, received_at).await;
    respond("single", 1, outcome)
}

pub async fn post_batch(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> std::result::Result<HttpResponse, IngestError> {
    let received_at = Utc::now();
    let submitted = body
        .get("events")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let outcome = ingest_batch(&state.publisher, &body, received_at).await;
    respond("batch", submitted, outcome)
}

fn respond(
    endpoint: &str,
    submitted: usize,
    outcome: Result<IngestAck>,
) -> std::result::Result<HttpResponse, IngestError> {
    match outcome {
        Ok(ack) => {
            record_events(endpoint, "accepted", ack.accepted.unwrap_or(1));
            Ok(HttpResponse::Accepted().json(ack))
        }
        Err(err) => {
            let result = match &err {
                IngestError::Validation(e) => {
                    debug!(endpoint, field = ?e.field, error = %e, "Rejected invalid request");
                    "invalid"
                }
                IngestError::Publish(e) => {
                    warn!(endpoint, error = %e, "Publish failed");
                    "publish_failed"
                }
                IngestError::Internal(e) => {
                    tracing::error!(endpoint, error = %e, "Unclassified ingestion failure");
                    "internal_error"
                }
            };
            record_events(endpoint, result, submitted.max(1));
            Err(err)
        }
    }
}
