/// Configuration management
use serde::Deserialize;
use std::time::Duration;

/// Consumer settings, read from the environment.
/// The store connection is configured separately through `db_pool::DbConfig`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_brokers")]
    pub kafka_brokers: String,
    #[serde(default = "default_group_id")]
    pub kafka_group_id: String,
    #[serde(default = "default_topic")]
    pub kafka_topic: String,
    #[serde(default = "default_client_id")]
    pub kafka_client_id: String,
    #[serde(default = "default_session_timeout_ms")]
    pub kafka_session_timeout_ms: u64,
    /// Bound on the startup metadata check
    #[serde(default = "default_connect_timeout_ms")]
    pub kafka_connect_timeout_ms: u64,
    #[serde(default = "default_max_poll_interval_ms")]
    pub kafka_max_poll_interval_ms: u64,
    /// How often stored offsets are committed in the background
    #[serde(default = "default_auto_commit_interval_ms")]
    pub kafka_auto_commit_interval_ms: u64,
    /// Records queued per partition before that partition is paused
    #[serde(default = "default_partition_queue_capacity")]
    pub partition_queue_capacity: usize,
    /// Upper bound on waiting for partition workers at shutdown
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default)]
    pub run_migrations: bool,
    #[serde(default = "default_metrics_host")]
    pub metrics_host: String,
    /// Port for `/metrics` and `/health`
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl ConsumerConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_connect_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            kafka_brokers: default_brokers(),
            kafka_group_id: default_group_id(),
            kafka_topic: default_topic(),
            kafka_client_id: default_client_id(),
            kafka_session_timeout_ms: default_session_timeout_ms(),
            kafka_connect_timeout_ms: default_connect_timeout_ms(),
            kafka_max_poll_interval_ms: default_max_poll_interval_ms(),
            kafka_auto_commit_interval_ms: default_auto_commit_interval_ms(),
            partition_queue_capacity: default_partition_queue_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
            run_migrations: false,
            metrics_host: default_metrics_host(),
            metrics_port: default_metrics_port(),
            log_format: default_log_format(),
        }
    }
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "events-consumer-1".to_string()
}

fn default_topic() -> String {
    event_schema::DEFAULT_TOPIC.to_string()
}

fn default_client_id() -> String {
    "events-consumer".to_string()
}

fn default_session_timeout_ms() -> u64 {
    45000
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

fn default_max_poll_interval_ms() -> u64 {
    300000
}

fn default_auto_commit_interval_ms() -> u64 {
    5000
}

fn default_partition_queue_capacity() -> usize {
    64
}

fn default_drain_timeout_ms() -> u64 {
    30000
}

fn default_metrics_host() -> String {
    "0.0.0.0".to_string()
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_log_format() -> String {
    "text".to_string()
}
