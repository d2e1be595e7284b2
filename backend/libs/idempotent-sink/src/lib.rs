//! # Idempotent Event Sink
//!
//! Persists records read from the events topic into PostgreSQL so that
//! redelivery of the same physical log record never creates a second row.
//!
//! ## Problem
//!
//! The consumer runs with at-least-once delivery:
//! - **Rebalances**: a partition moves to another instance before its offset is committed
//! - **Restarts**: the process dies between the insert and the offset commit
//! - **Failed persists**: a record may be read again after a store outage
//!
//! ## Solution
//!
//! The natural key of a row is its broker coordinates
//! `(kafka_topic, kafka_partition, kafka_offset)`, protected by a unique
//! constraint. Every insert is `INSERT ... ON CONFLICT DO NOTHING`, so:
//! - first delivery → `row_count = 1`
//! - any redelivery → `row_count = 0`, a successful no-op
//!
//! ## Architecture
//!
//! ```text
//! Kafka → events-consumer → EventSink::persist → PostgreSQL
//!                                                (events_ingested)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use idempotent_sink::{EventSink, IngestedRecord, PgEventSink};
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let sink = PgEventSink::new(pool);
//! let record = IngestedRecord {
//!     topic: "events_raw".to_string(),
//!     partition: 0,
//!     offset: 5,
//!     timestamp_ms: Some(1_704_067_200_000),
//!     key: Some("t1".to_string()),
//!     value: Some(serde_json::json!({"event_type": "click"})),
//! };
//!
//! assert_eq!(sink.persist(&record).await?.row_count, 1);
//! assert_eq!(sink.persist(&record).await?.row_count, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Safety
//!
//! Each insert is a single self-contained statement on a pooled connection.
//! There are no cross-record transactions and no shared mutable state, so the
//! sink can be called from one task per partition at the same time. Two
//! concurrent inserts of the same coordinates resolve in the database: one
//! gets `row_count = 1`, the other `row_count = 0`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::migrate::Migrator;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

mod error;
#[cfg(feature = "test-util")]
mod memory;

pub use error::{PersistError, PersistResult};
#[cfg(feature = "test-util")]
pub use memory::MemoryEventSink;

/// Schema for `events_ingested`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// One physical log record, ready to be written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Broker timestamp in milliseconds, when the message carries one
    pub timestamp_ms: Option<i64>,
    /// Message key (the tenant id used as partition key)
    pub key: Option<String>,
    /// Decoded message value; `None` is stored as SQL NULL
    pub value: Option<serde_json::Value>,
}

impl IngestedRecord {
    /// Composite natural key of the row
    pub fn coordinates(&self) -> (&str, i32, i64) {
        (&self.topic, self.partition, self.offset)
    }

    fn validate(&self) -> PersistResult<()> {
        if self.topic.is_empty() {
            return Err(PersistError::InvalidRecord(
                "topic cannot be empty".to_string(),
            ));
        }

        if self.partition < 0 {
            return Err(PersistError::InvalidRecord(format!(
                "partition must be non-negative, got {}",
                self.partition
            )));
        }

        if self.offset < 0 {
            return Err(PersistError::InvalidRecord(format!(
                "offset must be non-negative, got {}",
                self.offset
            )));
        }

        Ok(())
    }
}

/// Outcome of a single insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertResult {
    /// 1 on first-time persistence, 0 when the coordinates already exist
    pub row_count: u64,
}

impl InsertResult {
    pub fn inserted() -> Self {
        Self { row_count: 1 }
    }

    pub fn duplicate() -> Self {
        Self { row_count: 0 }
    }

    pub fn is_duplicate(&self) -> bool {
        self.row_count == 0
    }
}

/// Write side of the consumer. Implementations must treat a repeated
/// `(topic, partition, offset)` as a successful no-op.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn persist(&self, record: &IngestedRecord) -> PersistResult<InsertResult>;

    /// Release the underlying store. Must be safe to call more than once.
    async fn close(&self) {}
}

/// PostgreSQL-backed sink writing to `events_ingested`
#[derive(Clone)]
pub struct PgEventSink {
    pool: PgPool,
}

impl PgEventSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of rows stored for the given coordinates (0 or 1)
    pub async fn count_for(&self, topic: &str, partition: i32, offset: i64) -> PersistResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM events_ingested
            WHERE kafka_topic = $1 AND kafka_partition = $2 AND kafka_offset = $3
            "#,
        )
        .bind(topic)
        .bind(partition)
        .bind(offset)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }
}

#[async_trait]
impl EventSink for PgEventSink {
    async fn persist(&self, record: &IngestedRecord) -> PersistResult<InsertResult> {
        record.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO events_ingested (
                kafka_topic,
                kafka_partition,
                kafka_offset,
                kafka_timestamp_ms,
                message_key,
                message_value
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (kafka_topic, kafka_partition, kafka_offset) DO NOTHING
            "#,
        )
        .bind(&record.topic)
        .bind(record.partition)
        .bind(record.offset)
        .bind(record.timestamp_ms)
        .bind(&record.key)
        .bind(&record.value)
        .execute(&self.pool)
        .await?;

        let insert = InsertResult {
            row_count: result.rows_affected(),
        };

        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            row_count = insert.row_count,
            "Insert attempt finished (0 = duplicate)"
        );

        Ok(insert)
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("Event sink pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(partition: i32, offset: i64) -> IngestedRecord {
        IngestedRecord {
            topic: "events_raw".to_string(),
            partition,
            offset,
            timestamp_ms: None,
            key: None,
            value: None,
        }
    }

    #[test]
    fn test_validate_record() {
        assert!(record(0, 0).validate().is_ok());
        assert!(record(3, i64::MAX).validate().is_ok());

        let err = record(-1, 0).validate().unwrap_err();
        assert!(matches!(err, PersistError::InvalidRecord(_)));

        let err = record(0, -1).validate().unwrap_err();
        assert!(matches!(err, PersistError::InvalidRecord(_)));

        let empty_topic = IngestedRecord {
            topic: String::new(),
            ..record(0, 0)
        };
        assert!(matches!(
            empty_topic.validate().unwrap_err(),
            PersistError::InvalidRecord(_)
        ));
    }

    #[test]
    fn test_insert_result() {
        assert!(!InsertResult::inserted().is_duplicate());
        assert!(InsertResult::duplicate().is_duplicate());
        assert_eq!(InsertResult::inserted().row_count, 1);
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(record(2, 17).coordinates(), ("events_raw", 2, 17));
    }
}
