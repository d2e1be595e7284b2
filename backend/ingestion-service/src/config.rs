/// Configuration management
use serde::Deserialize;
use std::time::Duration;

/// Ingestion service settings, read from the environment.
/// Every field has a local-development default.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Loaded from the same variables in a second pass
    #[serde(skip)]
    pub kafka: KafkaProducerConfig,
}

/// Broker settings for the publisher. Timeouts are passed straight to librdkafka.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaProducerConfig {
    #[serde(default = "default_brokers")]
    pub kafka_brokers: String,
    #[serde(default = "default_topic")]
    pub kafka_topic: String,
    #[serde(default = "default_client_id")]
    pub kafka_client_id: String,
    #[serde(default = "default_acks")]
    pub kafka_acks: String,
    /// Local delivery timeout per message (`message.timeout.ms`)
    #[serde(default = "default_message_timeout_ms")]
    pub kafka_message_timeout_ms: u64,
    /// Broker request timeout (`request.timeout.ms`)
    #[serde(default = "default_request_timeout_ms")]
    pub kafka_request_timeout_ms: u64,
    /// Bound on the startup metadata check and on the shutdown flush
    #[serde(default = "default_connect_timeout_ms")]
    pub kafka_connect_timeout_ms: u64,
}

impl IngestionConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: Vec<(String, String)>) -> Result<Self, envy::Error> {
        let mut config: Self = envy::from_iter(vars.clone())?;
        config.kafka = envy::from_iter(vars)?;
        Ok(config)
    }
}

impl KafkaProducerConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_message_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_connect_timeout_ms)
    }
}

impl Default for KafkaProducerConfig {
    fn default() -> Self {
        Self {
            kafka_brokers: default_brokers(),
            kafka_topic: default_topic(),
            kafka_client_id: default_client_id(),
            kafka_acks: default_acks(),
            kafka_message_timeout_ms: default_message_timeout_ms(),
            kafka_request_timeout_ms: default_request_timeout_ms(),
            kafka_connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    event_schema::DEFAULT_TOPIC.to_string()
}

fn default_client_id() -> String {
    "ingestion-service".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_message_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config = IngestionConfig::from_vars(Vec::new()).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.kafka.kafka_brokers, "localhost:9092");
        assert_eq!(config.kafka.kafka_topic, "events_raw");
        assert_eq!(config.kafka.kafka_acks, "all");
        assert_eq!(config.kafka.message_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let vars = vec![
            ("PORT".to_string(), "8081".to_string()),
            ("KAFKA_BROKERS".to_string(), "k1:9092,k2:9092".to_string()),
            ("KAFKA_TOPIC".to_string(), "events_test".to_string()),
            ("KAFKA_MESSAGE_TIMEOUT_MS".to_string(), "750".to_string()),
        ];
        let config = IngestionConfig::from_vars(vars).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.kafka.kafka_brokers, "k1:9092,k2:9092");
        assert_eq!(config.kafka.kafka_topic, "events_test");
        assert_eq!(config.kafka.message_timeout(), Duration::from_millis(750));
    }
}
