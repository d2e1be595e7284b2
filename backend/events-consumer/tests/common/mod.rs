//! In-process stand-in for the Kafka side of the consumer.

#![allow(dead_code)]

use async_trait::async_trait;
use events_consumer::{InboundRecord, RecordSource};
use rdkafka::error::KafkaResult;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const TOPIC: &str = "T";
pub const CLICK: &str = r#"{"event_type":"click","tenant_id":"t1","properties":{}}"#;

pub fn record(partition: i32, offset: i64, value: Option<&str>) -> InboundRecord {
    InboundRecord {
        topic: TOPIC.to_string(),
        partition,
        offset,
        timestamp_ms: Some(1_704_067_200_000),
        key: Some(b"t1".to_vec()),
        value: value.map(|v| v.as_bytes().to_vec()),
    }
}

/// Delivers whatever is pushed through [`ScriptedSource::deliver`] and records
/// offset stores, pauses, resumes and commits. Once the script is exhausted
/// `recv` waits forever, like an idle topic.
pub struct ScriptedSource {
    feed: mpsc::UnboundedSender<InboundRecord>,
    records: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundRecord>>,
    stored: Mutex<Vec<(String, i32, i64)>>,
    paused: Mutex<HashSet<i32>>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    commits: AtomicUsize,
    unsubscribes: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        let (feed, records) = mpsc::unbounded_channel();
        Self {
            feed,
            records: tokio::sync::Mutex::new(records),
            stored: Mutex::new(Vec::new()),
            paused: Mutex::new(HashSet::new()),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        }
    }

    pub fn deliver(&self, record: InboundRecord) {
        self.feed.send(record).expect("source receiver dropped");
    }

    pub fn stored(&self) -> Vec<(String, i32, i64)> {
        self.stored.lock().unwrap().clone()
    }

    pub fn stored_for(&self, partition: i32) -> Vec<i64> {
        self.stored()
            .into_iter()
            .filter(|(_, p, _)| *p == partition)
            .map(|(_, _, offset)| offset)
            .collect()
    }

    pub fn is_paused(&self, partition: i32) -> bool {
        self.paused.lock().unwrap().contains(&partition)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn recv(&self) -> KafkaResult<InboundRecord> {
        let next = self.records.lock().await.recv().await;
        match next {
            Some(record) => Ok(record),
            None => std::future::pending().await,
        }
    }

    fn store_offset(&self, topic: &str, partition: i32, next_offset: i64) -> KafkaResult<()> {
        self.stored
            .lock()
            .unwrap()
            .push((topic.to_string(), partition, next_offset));
        Ok(())
    }

    fn pause(&self, _topic: &str, partition: i32) -> KafkaResult<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.paused.lock().unwrap().insert(partition);
        Ok(())
    }

    fn resume(&self, _topic: &str, partition: i32) -> KafkaResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.paused.lock().unwrap().remove(&partition);
        Ok(())
    }

    fn commit(&self) -> KafkaResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }
}
