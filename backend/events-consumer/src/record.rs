//! Per-record handling: decode a delivered message and hand it to the sink.
//!
//! Every record ends in exactly one [`RecordOutcome`]. Only `Persisted` and
//! `Skipped` let the partition's offset move past the record.

use idempotent_sink::{EventSink, IngestedRecord, InsertResult};
use rdkafka::message::Message;
use serde_json::Value;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Owned copy of a delivered message, detached from the consumer's buffer
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp_ms: Option<i64>,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

impl InboundRecord {
    pub fn from_message<M: Message>(msg: &M) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            timestamp_ms: msg.timestamp().to_millis(),
            key: msg.key().map(<[u8]>::to_vec),
            value: msg.payload().map(<[u8]>::to_vec),
        }
    }

    /// Key as text; invalid UTF-8 is replaced rather than rejected
    pub fn key_text(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
    }

    /// Decode the value as JSON into a row for the sink
    pub fn decode(&self) -> Result<IngestedRecord, SkipReason> {
        let raw = self.value.as_deref().ok_or(SkipReason::MissingValue)?;

        let value: Value = serde_json::from_slice(raw).map_err(|e| SkipReason::InvalidJson {
            error: e.to_string(),
            raw: String::from_utf8_lossy(raw).into_owned(),
        })?;

        Ok(IngestedRecord {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
            timestamp_ms: self.timestamp_ms,
            key: self.key_text(),
            value: Some(value),
        })
    }
}

/// Why a record was passed over without a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingValue,
    InvalidJson { error: String, raw: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingValue => write!(f, "message has no value"),
            SkipReason::InvalidJson { error, .. } => write!(f, "value is not valid JSON: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Written, or recognised as a redelivery (`row_count = 0`)
    Persisted(InsertResult),
    Skipped(SkipReason),
    /// The sink rejected the write; the record is not considered stored
    Failed(String),
}

impl RecordOutcome {
    /// Whether the consumer may store the offset after this record
    pub fn advances_offset(&self) -> bool {
        !matches!(self, RecordOutcome::Failed(_))
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Persisted(result) if result.is_duplicate() => "duplicate",
            RecordOutcome::Persisted(_) => "persisted",
            RecordOutcome::Skipped(_) => "skipped",
            RecordOutcome::Failed(_) => "failed",
        }
    }
}

/// Decode and persist one record. Never returns an error: every failure is
/// folded into the outcome so the partition keeps moving.
pub async fn process_record(sink: &dyn EventSink, record: &InboundRecord) -> RecordOutcome {
    let row = match record.decode() {
        Ok(row) => row,
        Err(reason) => {
            match &reason {
                SkipReason::MissingValue => warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "Message without value, skipping"
                ),
                SkipReason::InvalidJson { error, raw } => warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %error,
                    raw = %raw,
                    "Failed to parse message value as JSON, skipping"
                ),
            }
            return RecordOutcome::Skipped(reason);
        }
    };

    match sink.persist(&row).await {
        Ok(result) if result.is_duplicate() => {
            debug!(
                topic = %row.topic,
                partition = row.partition,
                offset = row.offset,
                "Duplicate record ignored"
            );
            RecordOutcome::Persisted(result)
        }
        Ok(result) => {
            info!(
                topic = %row.topic,
                partition = row.partition,
                offset = row.offset,
                tenant_id = row.key.as_deref().unwrap_or(""),
                "Record persisted"
            );
            RecordOutcome::Persisted(result)
        }
        Err(e) => {
            error!(
                topic = %row.topic,
                partition = row.partition,
                offset = row.offset,
                error = %e,
                transient = e.is_transient(),
                "Failed to persist record"
            );
            RecordOutcome::Failed(e.to_string())
        }
    }
}
