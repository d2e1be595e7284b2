use rdkafka::error::KafkaError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Startup and run failures of the consumer. Per-record decode and persist
/// failures never surface here; they become a `RecordOutcome`.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Partition worker failed: {0}")]
    Worker(String),
}
