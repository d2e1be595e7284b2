//! Events consumer: reads the events topic and persists each record exactly
//! once per `(topic, partition, offset)` into PostgreSQL.

pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod shutdown;
pub mod source;
pub mod stats;

pub use consumer::{ConsumerState, EventsConsumer};
pub use error::{ConsumerError, Result};
pub use record::{InboundRecord, RecordOutcome, SkipReason};
pub use source::{KafkaSource, RecordSource};
pub use stats::{OutcomeSnapshot, OutcomeStats};
