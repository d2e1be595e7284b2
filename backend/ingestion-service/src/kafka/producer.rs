use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::KafkaProducerConfig;

/// Transport-level failure. Only its message crosses into [`crate::error::PublishError`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Kafka operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Kafka task failed: {0}")]
    Task(String),
}

/// Raw send path to the broker. Concurrent calls are allowed; ordering per
/// key is the transport's responsibility.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Wait for queued messages to be delivered
    async fn flush(&self) -> Result<(), TransportError>;
}

/// rdkafka producer wrapper. Only obtainable through [`KafkaTransport::connect`],
/// which fails if the cluster cannot be reached.
#[derive(Clone)]
pub struct KafkaTransport {
    producer: FutureProducer,
    message_timeout: Duration,
    connect_timeout: Duration,
}

impl KafkaTransport {
    pub async fn connect(config: &KafkaProducerConfig) -> Result<Self, TransportError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("client.id", &config.kafka_client_id)
            .set("acks", &config.kafka_acks)
            .set(
                "message.timeout.ms",
                config.kafka_message_timeout_ms.to_string(),
            )
            .set(
                "request.timeout.ms",
                config.kafka_request_timeout_ms.to_string(),
            )
            .set("enable.idempotence", "true")
            .set("compression.type", "lz4")
            .create()?;

        let transport = Self {
            producer,
            message_timeout: config.message_timeout(),
            connect_timeout: config.connect_timeout(),
        };

        // librdkafka connects lazily; fetch metadata so an unreachable cluster
        // fails startup instead of the first request.
        let producer = transport.producer.clone();
        let timeout = transport.connect_timeout;
        let topic = config.kafka_topic.clone();
        let metadata = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), timeout)
                .map(|m| m.orig_broker_name().to_string())
        })
        .await
        .map_err(|e| TransportError::Task(e.to_string()))??;

        info!(
            brokers = %config.kafka_brokers,
            broker = %metadata,
            topic = %config.kafka_topic,
            "Kafka producer connected"
        );

        Ok(transport)
    }
}

#[async_trait]
impl EventTransport for KafkaTransport {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), TransportError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, self.message_timeout).await {
            Ok((partition, offset)) => {
                debug!(topic, key, partition, offset, "Event delivered");
                Ok(())
            }
            Err((e, _)) => Err(TransportError::Kafka(e)),
        }
    }

    async fn flush(&self) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let timeout = self.connect_timeout;
        let result = tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| TransportError::Task(e.to_string()))?;

        match result {
            Ok(()) => Ok(()),
            Err(KafkaError::Flush(code)) => {
                warn!(error = %code, "Kafka flush incomplete");
                Err(TransportError::Timeout(timeout))
            }
            Err(e) => Err(TransportError::Kafka(e)),
        }
    }
}
