pub mod producer;
pub mod publisher;

pub use producer::{EventTransport, KafkaTransport, TransportError};
pub use publisher::EventPublisher;
