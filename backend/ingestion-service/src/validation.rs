//! Request body validation.
//!
//! Pure functions from untyped JSON to [`Event`]. Checks run in a fixed order
//! and stop at the first failure, so the reported field is deterministic.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use event_schema::Event;
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Validated batch submission
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvents {
    pub events: Vec<Event>,
}

pub fn validate_single(payload: &Value) -> Result<Event, ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ValidationError::new("Body must be a JSON object", None))?;

    let event_type = match obj.get("event_type") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(ValidationError::new(
                "event_type is required and must be a string",
                Some("event_type"),
            ))
        }
    };

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(ValidationError::new(
                "timestamp is required and must be an ISO 8601 string",
                Some("timestamp"),
            ))
        }
    };

    if parse_timestamp(&timestamp).is_none() {
        return Err(ValidationError::new(
            "timestamp must be a valid ISO 8601 datetime string",
            Some("timestamp"),
        ));
    }

    let properties = match obj.get("properties") {
        Some(Value::Object(map)) => map.clone(),
        _ => {
            return Err(ValidationError::new(
                "properties is required and must be an object",
                Some("properties"),
            ))
        }
    };

    // Optional fields are checked in declaration order
    Ok(Event {
        tenant_id: optional_string(obj, "tenant_id")?,
        project_id: optional_string(obj, "project_id")?,
        event_type,
        timestamp,
        user_id: optional_string(obj, "user_id")?,
        session_id: optional_string(obj, "session_id")?,
        properties,
        idempotency_key: optional_string(obj, "idempotency_key")?,
    })
}

pub fn validate_batch(payload: &Value) -> Result<BatchEvents, ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ValidationError::new("Body must be a JSON object", None))?;

    let raw_events = match obj.get("events") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(ValidationError::new(
                "events must be a non-empty array",
                Some("events"),
            ))
        }
    };

    let events = raw_events
        .iter()
        .enumerate()
        .map(|(index, raw)| validate_single(raw).map_err(|err| err.at_index(index)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BatchEvents { events })
}

/// Absent means `None`; present-but-not-a-string (including `null`) fails.
fn optional_string(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(
            format!("{} must be a string when provided", field),
            Some(field),
        )),
    }
}

/// Accepts RFC 3339 plus the ISO 8601 forms without offset (read as UTC)
/// and plain calendar dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
