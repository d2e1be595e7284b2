use idempotent_sink::EventSink;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::dispatch::PartitionDispatcher;
use crate::error::Result;
use crate::source::{KafkaSource, RecordSource};
use crate::stats::{OutcomeSnapshot, OutcomeStats};

/// How often held-back records are offered to their partition queue again
const OVERFLOW_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of the consumer, observable through [`EventsConsumer::state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Subscribed,
    Running,
    Draining,
}

/// Reads the events topic under a consumer group and persists every record
/// through an [`EventSink`].
///
/// Offsets are committed in the background by librdkafka, but only offsets
/// explicitly stored by a partition worker are eligible, so a record whose
/// persist failed is never marked as consumed on its own account.
pub struct EventsConsumer {
    source: Arc<dyn RecordSource>,
    sink: Arc<dyn EventSink>,
    stats: Arc<OutcomeStats>,
    config: ConsumerConfig,
    state: watch::Sender<ConsumerState>,
}

impl EventsConsumer {
    /// Connect to Kafka and subscribe; an unreachable cluster is an error
    pub async fn connect(config: ConsumerConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let source = KafkaSource::connect(&config).await?;
        Ok(Self::with_source(Arc::new(source), sink, config))
    }

    /// Build around an already subscribed source
    pub fn with_source(
        source: Arc<dyn RecordSource>,
        sink: Arc<dyn EventSink>,
        config: ConsumerConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Subscribed);
        Self {
            source,
            sink,
            stats: Arc::new(OutcomeStats::new()),
            config,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> Arc<OutcomeStats> {
        self.stats.clone()
    }

    /// Consume until `shutdown` turns `true`, then drain.
    ///
    /// Nothing inside the loop waits on a partition worker, so the shutdown
    /// flag is observed as soon as it changes. Taking `self` by value means
    /// the drain happens once.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<OutcomeSnapshot> {
        info!(topic = %self.config.kafka_topic, "Starting events consumer loop");
        self.state.send_replace(ConsumerState::Running);

        let mut dispatcher = PartitionDispatcher::new(
            self.sink.clone(),
            self.source.clone(),
            self.stats.clone(),
            self.config.partition_queue_capacity,
        );
        let mut retry = tokio::time::interval(OVERFLOW_RETRY_INTERVAL);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut result = Ok(());

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping consumer");
                        break;
                    }
                }

                _ = retry.tick(), if dispatcher.has_overflow() => {
                    if let Err(e) = dispatcher.flush_overflow() {
                        error!(error = %e, "Partition worker lost, stopping consumer");
                        result = Err(e);
                        break;
                    }
                }

                message = self.source.recv() => {
                    match message {
                        Ok(record) => {
                            debug!(
                                topic = %record.topic,
                                partition = record.partition,
                                offset = record.offset,
                                "Received record"
                            );

                            if let Err(e) = dispatcher.dispatch(record) {
                                error!(error = %e, "Partition worker lost, stopping consumer");
                                result = Err(e);
                                break;
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Kafka consumer error");
                            // Continue consuming despite errors
                        }
                    }
                }
            }
        }

        self.finish(dispatcher, result).await
    }

    /// Drain workers, commit stored offsets, release the broker and the
    /// store, and report `Disconnected`
    async fn finish(
        &self,
        mut dispatcher: PartitionDispatcher,
        mut result: Result<()>,
    ) -> Result<OutcomeSnapshot> {
        self.state.send_replace(ConsumerState::Draining);
        info!(workers = dispatcher.worker_count(), "Draining events consumer");

        if let Err(e) = dispatcher.drain(self.config.drain_timeout()).await {
            if result.is_ok() {
                result = Err(e);
            }
        }

        match self.source.commit() {
            Ok(()) => info!("Stored offsets committed"),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("No stored offsets to commit")
            }
            Err(e) => warn!(error = %e, "Final offset commit failed"),
        }
        self.source.unsubscribe();
        self.sink.close().await;

        let snapshot = self.stats.snapshot();
        info!(
            persisted = snapshot.persisted,
            duplicate = snapshot.duplicate,
            skipped = snapshot.skipped,
            failed = snapshot.failed,
            "Events consumer stopped"
        );
        self.state.send_replace(ConsumerState::Disconnected);

        result.map(|()| snapshot)
    }
}
