//! Fan-out of delivered records to one sequential worker per partition.
//!
//! Each `(topic, partition)` gets its own task fed by a bounded queue, so
//! records of one partition (and therefore one tenant) are handled strictly
//! in delivery order while different partitions proceed concurrently.
//!
//! Dispatch never waits. When a partition's queue is full the record is held
//! in that partition's overflow and the partition is paused at the broker;
//! [`PartitionDispatcher::flush_overflow`] moves held records on as the
//! worker catches up and resumes the partition once nothing is held. A slow
//! partition therefore never stops delivery for the others.

use futures::future::join_all;
use idempotent_sink::EventSink;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ConsumerError, Result};
use crate::metrics;
use crate::record::{process_record, InboundRecord};
use crate::source::RecordSource;
use crate::stats::OutcomeStats;

type PartitionKey = (String, i32);

struct PartitionWorker {
    sender: mpsc::Sender<InboundRecord>,
    handle: JoinHandle<()>,
    /// Records received while the queue was full; non-empty means paused
    overflow: VecDeque<InboundRecord>,
}

pub struct PartitionDispatcher {
    sink: Arc<dyn EventSink>,
    source: Arc<dyn RecordSource>,
    stats: Arc<OutcomeStats>,
    capacity: usize,
    workers: HashMap<PartitionKey, PartitionWorker>,
}

impl PartitionDispatcher {
    pub fn new(
        sink: Arc<dyn EventSink>,
        source: Arc<dyn RecordSource>,
        stats: Arc<OutcomeStats>,
        capacity: usize,
    ) -> Self {
        Self {
            sink,
            source,
            stats,
            capacity: capacity.max(1),
            workers: HashMap::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Whether any partition is paused with records held back
    pub fn has_overflow(&self) -> bool {
        self.workers.values().any(|w| !w.overflow.is_empty())
    }

    /// Queue a record behind earlier records of the same partition
    pub fn dispatch(&mut self, record: InboundRecord) -> Result<()> {
        let key = (record.topic.clone(), record.partition);

        if !self.workers.contains_key(&key) {
            let worker = self.spawn_worker(&key);
            self.workers.insert(key.clone(), worker);
            metrics::set_partition_workers(self.workers.len());
        }

        let worker = self
            .workers
            .get_mut(&key)
            .ok_or_else(|| worker_lost(&key))?;

        if !worker.overflow.is_empty() {
            worker.overflow.push_back(record);
            return Ok(());
        }

        match worker.sender.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(record)) => {
                worker.overflow.push_back(record);
                debug!(topic = %key.0, partition = key.1, "Partition queue full, pausing");
                if let Err(e) = self.source.pause(&key.0, key.1) {
                    warn!(topic = %key.0, partition = key.1, error = %e, "Failed to pause partition");
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(worker_lost(&key)),
        }
    }

    /// Move held records into queues that have room again and resume every
    /// partition whose overflow is empty
    pub fn flush_overflow(&mut self) -> Result<()> {
        for (key, worker) in self.workers.iter_mut() {
            if worker.overflow.is_empty() {
                continue;
            }

            while let Some(record) = worker.overflow.pop_front() {
                match worker.sender.try_send(record) {
                    Ok(()) => {}
                    Err(TrySendError::Full(record)) => {
                        worker.overflow.push_front(record);
                        break;
                    }
                    Err(TrySendError::Closed(_)) => return Err(worker_lost(key)),
                }
            }

            if worker.overflow.is_empty() {
                debug!(topic = %key.0, partition = key.1, "Partition caught up, resuming");
                if let Err(e) = self.source.resume(&key.0, key.1) {
                    warn!(topic = %key.0, partition = key.1, error = %e, "Failed to resume partition");
                }
            }
        }
        Ok(())
    }

    /// Close every queue and wait up to `timeout` for workers to finish the
    /// records they hold. Overflow is discarded without storing offsets, so
    /// those records are redelivered. Workers still busy at the deadline are
    /// aborted.
    pub async fn drain(&mut self, timeout: Duration) -> Result<()> {
        let workers = std::mem::take(&mut self.workers);
        debug!(workers = workers.len(), "Draining partition workers");

        let mut held_back = 0;
        let handles: Vec<_> = workers
            .into_values()
            .map(|worker| {
                held_back += worker.overflow.len();
                drop(worker.sender);
                worker.handle
            })
            .collect();

        if held_back > 0 {
            info!(records = held_back, "Leaving held-back records for redelivery");
        }

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let mut first_error = None;

        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "Partition worker failed during drain");
                        first_error.get_or_insert_with(|| ConsumerError::Worker(e.to_string()));
                    }
                }
            }
            Err(_) => {
                warn!(?timeout, "Partition workers still busy, aborting");
                for abort in aborts {
                    abort.abort();
                }
            }
        }
        metrics::set_partition_workers(0);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn spawn_worker(&self, key: &PartitionKey) -> PartitionWorker {
        let (sender, receiver) = mpsc::channel(self.capacity);
        debug!(topic = %key.0, partition = key.1, "Starting partition worker");

        let handle = tokio::spawn(run_partition(
            receiver,
            self.sink.clone(),
            self.source.clone(),
            self.stats.clone(),
        ));

        PartitionWorker {
            sender,
            handle,
            overflow: VecDeque::new(),
        }
    }
}

fn worker_lost(key: &PartitionKey) -> ConsumerError {
    ConsumerError::Worker(format!("{}[{}]: worker exited", key.0, key.1))
}

async fn run_partition(
    mut receiver: mpsc::Receiver<InboundRecord>,
    sink: Arc<dyn EventSink>,
    source: Arc<dyn RecordSource>,
    stats: Arc<OutcomeStats>,
) {
    while let Some(record) = receiver.recv().await {
        let outcome = process_record(sink.as_ref(), &record).await;
        stats.record(&outcome);

        if !outcome.advances_offset() {
            continue;
        }

        if let Err(e) = source.store_offset(&record.topic, record.partition, record.offset + 1) {
            // Typically the partition was revoked by a rebalance
            warn!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Failed to store offset"
            );
        }
    }
}
