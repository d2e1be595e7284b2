//! Turns validated events into keyed broker messages.
//!
//! The tenant id is the partition key: all events of one tenant land on the
//! same partition and keep their submission order, while different tenants
//! spread across partitions.

use chrono::{DateTime, Utc};
use event_schema::{EnrichedEvent, Event, INGESTION_SOURCE};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::producer::EventTransport;
use crate::error::PublishError;

pub struct EventPublisher {
    transport: Arc<dyn EventTransport>,
    topic: String,
    source: String,
    closed: AtomicBool,
}

/// A message ready for the transport
struct Outgoing {
    key: String,
    payload: Vec<u8>,
}

impl EventPublisher {
    /// `transport` must already be connected; see [`super::KafkaTransport::connect`].
    pub fn new(transport: Arc<dyn EventTransport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
            source: INGESTION_SOURCE.to_string(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(
        &self,
        event: &Event,
        received_at: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        self.ensure_open()?;

        let outgoing = self.prepare(event, received_at).map_err(|err| {
            warn!(event_type = %event.event_type, error = %err, "Event not publishable");
            err
        })?;

        self.transport
            .send(&self.topic, &outgoing.key, &outgoing.payload)
            .await
            .map_err(|e| {
                error!(
                    topic = %self.topic,
                    tenant_id = %outgoing.key,
                    error = %e,
                    "Failed to publish event"
                );
                PublishError::new(
                    "Failed to publish event to Kafka",
                    json!({ "originalError": e.to_string(), "topic": self.topic }),
                )
            })?;

        debug!(
            topic = %self.topic,
            tenant_id = %outgoing.key,
            event_type = %event.event_type,
            "Event published"
        );
        Ok(())
    }

    /// Publish a batch as one logical unit. Every element must carry a tenant
    /// id; if any does not, nothing is sent. Otherwise all messages are
    /// enqueued together and every delivery report is awaited.
    pub async fn publish_batch(
        &self,
        events: &[Event],
        received_at: DateTime<Utc>,
    ) -> Result<usize, PublishError> {
        self.ensure_open()?;

        if let Some(index) = events.iter().position(|e| e.partition_key().is_none()) {
            warn!(index, "Rejected batch: event without tenant_id");
            return Err(PublishError::new(
                format!("Event at index {} is missing tenant_id; batch rejected", index),
                json!({ "index": index, "event": events[index] }),
            ));
        }

        let outgoing = events
            .iter()
            .map(|event| self.prepare(event, received_at))
            .collect::<Result<Vec<_>, _>>()?;

        let sends = outgoing
            .iter()
            .map(|msg| self.transport.send(&self.topic, &msg.key, &msg.payload));
        let results = join_all(sends).await;

        let failures: Vec<_> = results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| {
                result
                    .as_ref()
                    .err()
                    .map(|e| json!({ "index": index, "originalError": e.to_string() }))
            })
            .collect();

        if !failures.is_empty() {
            error!(
                topic = %self.topic,
                failed = failures.len(),
                total = events.len(),
                "Batch publish partially failed"
            );
            return Err(PublishError::new(
                format!(
                    "Failed to publish {} of {} events to Kafka",
                    failures.len(),
                    events.len()
                ),
                json!({
                    "topic": self.topic,
                    "failed": failures,
                    "delivered": events.len() - failures.len(),
                }),
            ));
        }

        debug!(topic = %self.topic, count = events.len(), "Batch published");
        Ok(events.len())
    }

    /// Flush outstanding deliveries. Only the first call does any work.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.transport.flush().await {
            Ok(()) => info!("Kafka producer flushed and closed"),
            Err(e) => warn!(error = %e, "Kafka producer closed with undelivered messages"),
        }
    }

    fn ensure_open(&self) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::new(
                "Kafka producer is shutting down",
                json!({ "topic": self.topic }),
            ));
        }
        Ok(())
    }

    fn prepare(&self, event: &Event, received_at: DateTime<Utc>) -> Result<Outgoing, PublishError> {
        let key = event.partition_key().map(str::to_string).ok_or_else(|| {
            PublishError::new(
                "tenant_id is required to publish an event",
                json!({ "event": event }),
            )
        })?;

        let enriched = EnrichedEvent::new(event.clone(), received_at, self.source.as_str());
        let payload = enriched.to_payload().map_err(|e| {
            PublishError::new(
                "Failed to serialize event",
                json!({ "originalError": e.to_string() }),
            )
        })?;

        Ok(Outgoing { key, payload })
    }
}
