//! Ingestion service: validates application events and publishes them onto
//! the events topic, keyed by tenant.

pub mod config;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod metrics;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use kafka::EventPublisher;

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<EventPublisher>,
}

impl AppState {
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        Self { publisher }
    }
}
