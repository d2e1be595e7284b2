//! Broker side of the consumer loop.
//!
//! [`RecordSource`] is everything the loop and its partition workers need
//! from Kafka: delivery, offset bookkeeping and per-partition flow control.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::TopicPartitionList;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ConsumerConfig;
use crate::error::{ConsumerError, Result};
use crate::record::InboundRecord;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Wait for the next delivered record
    async fn recv(&self) -> KafkaResult<InboundRecord>;

    /// Mark `next_offset` as the position to commit for the partition
    fn store_offset(&self, topic: &str, partition: i32, next_offset: i64) -> KafkaResult<()>;

    /// Stop fetching a partition whose worker is saturated
    fn pause(&self, topic: &str, partition: i32) -> KafkaResult<()>;

    fn resume(&self, topic: &str, partition: i32) -> KafkaResult<()>;

    /// Synchronously commit every stored offset
    fn commit(&self) -> KafkaResult<()>;

    fn unsubscribe(&self);
}

/// `StreamConsumer` subscribed to the events topic. Auto-commit only picks
/// up offsets stored through [`RecordSource::store_offset`].
pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaSource {
    /// Create the client, verify the cluster is reachable and subscribe
    pub async fn connect(config: &ConsumerConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("group.id", &config.kafka_group_id)
            .set("client.id", &config.kafka_client_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set(
                "auto.commit.interval.ms",
                config.kafka_auto_commit_interval_ms.to_string(),
            )
            // New records only when the group has no committed position
            .set("auto.offset.reset", "latest")
            .set(
                "session.timeout.ms",
                config.kafka_session_timeout_ms.to_string(),
            )
            .set(
                "max.poll.interval.ms",
                config.kafka_max_poll_interval_ms.to_string(),
            )
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                error!("Failed to create Kafka consumer: {}", e);
                ConsumerError::Kafka(e)
            })?;
        let consumer = Arc::new(consumer);

        let client = consumer.clone();
        let topic = config.kafka_topic.clone();
        let timeout = config.connect_timeout();
        let broker = tokio::task::spawn_blocking(move || {
            client
                .fetch_metadata(Some(&topic), timeout)
                .map(|m| m.orig_broker_name().to_string())
        })
        .await
        .map_err(|e| ConsumerError::Task(e.to_string()))??;

        consumer.subscribe(&[&config.kafka_topic]).map_err(|e| {
            error!("Failed to subscribe to topic: {}", e);
            ConsumerError::Kafka(e)
        })?;

        info!(
            brokers = %config.kafka_brokers,
            broker = %broker,
            topic = %config.kafka_topic,
            group_id = %config.kafka_group_id,
            "Events consumer subscribed"
        );

        Ok(Self { consumer })
    }

    fn single(topic: &str, partition: i32) -> TopicPartitionList {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition(topic, partition);
        tpl
    }
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn recv(&self) -> KafkaResult<InboundRecord> {
        let msg = self.consumer.recv().await?;
        Ok(InboundRecord::from_message(&msg))
    }

    fn store_offset(&self, topic: &str, partition: i32, next_offset: i64) -> KafkaResult<()> {
        self.consumer.store_offset(topic, partition, next_offset)
    }

    fn pause(&self, topic: &str, partition: i32) -> KafkaResult<()> {
        self.consumer.pause(&Self::single(topic, partition))
    }

    fn resume(&self, topic: &str, partition: i32) -> KafkaResult<()> {
        self.consumer.resume(&Self::single(topic, partition))
    }

    fn commit(&self) -> KafkaResult<()> {
        self.consumer.commit_consumer_state(CommitMode::Sync)
    }

    fn unsubscribe(&self) {
        self.consumer.unsubscribe();
    }
}
