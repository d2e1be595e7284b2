//! Topic contract shared by the ingestion service and the events consumer.
//!
//! The producer publishes one [`EnrichedEvent`] per accepted [`Event`] onto a
//! single topic. The message key is the tenant id (UTF-8), the value is the
//! UTF-8 JSON encoding of the enriched event. The consumer never depends on
//! these types for persistence: it stores whatever JSON it receives.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default topic name when `KAFKA_TOPIC` is not configured
pub const DEFAULT_TOPIC: &str = "events_raw";

/// Origin tag written into `_meta.source` by the ingestion service
pub const INGESTION_SOURCE: &str = "ingestion-service";

/// A validated application event, as accepted at the HTTP boundary.
///
/// `timestamp` is kept verbatim as submitted; validation guarantees it parses
/// to an instant. Optional fields are omitted from the wire format when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Partition key on the broker. Publishing fails without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub event_type: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Event {
    /// Tenant id used as the broker message key. A blank tenant counts as
    /// missing.
    pub fn partition_key(&self) -> Option<&str> {
        self.tenant_id.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Metadata attached by the ingestion service before publishing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Instant the boundary accepted the request
    #[serde(with = "iso_millis")]
    pub received_at: DateTime<Utc>,
    /// Static origin tag
    pub source: String,
}

/// Wire payload: the event fields at top level plus a `_meta` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(rename = "_meta")]
    pub meta: EventMeta,
}

impl EnrichedEvent {
    pub fn new(event: Event, received_at: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            event,
            meta: EventMeta {
                received_at,
                source: source.into(),
            },
        }
    }

    /// Serialize to the UTF-8 JSON bytes placed on the broker
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn partition_key(&self) -> Option<&str> {
        self.event.partition_key()
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
