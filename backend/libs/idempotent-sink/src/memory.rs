//! In-memory [`EventSink`] with the same uniqueness semantics as
//! `events_ingested`. Enabled by the `test-util` feature.

use crate::{EventSink, IngestedRecord, InsertResult, PersistError, PersistResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

type Coordinates = (String, i32, i64);

#[derive(Default)]
pub struct MemoryEventSink {
    rows: Mutex<BTreeMap<Coordinates, IngestedRecord>>,
    unavailable: AtomicBool,
    closes: AtomicUsize,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every persist fails with `PoolTimedOut`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_for(&self, topic: &str, partition: i32, offset: i64) -> usize {
        let rows = self.rows.lock().expect("sink mutex poisoned");
        usize::from(rows.contains_key(&(topic.to_string(), partition, offset)))
    }

    /// How many times `close` has been called
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Stored rows ordered by coordinates
    pub fn rows(&self) -> Vec<IngestedRecord> {
        let rows = self.rows.lock().expect("sink mutex poisoned");
        rows.values().cloned().collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn persist(&self, record: &IngestedRecord) -> PersistResult<InsertResult> {
        record.validate()?;

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut rows = self.rows.lock().expect("sink mutex poisoned");
        let key = (record.topic.clone(), record.partition, record.offset);
        if rows.contains_key(&key) {
            return Ok(InsertResult::duplicate());
        }
        rows.insert(key, record.clone());
        Ok(InsertResult::inserted())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
