use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use ingestion_service::config::IngestionConfig;
use ingestion_service::kafka::{EventPublisher, KafkaTransport};
use ingestion_service::{routes, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,ingestion_service=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = IngestionConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_format);

    tracing::info!("Starting ingestion-service");

    // Unreachable broker at startup is fatal
    let transport = KafkaTransport::connect(&config.kafka)
        .await
        .context("Failed to connect Kafka producer")?;
    let publisher = Arc::new(EventPublisher::new(
        Arc::new(transport),
        config.kafka.kafka_topic.clone(),
    ));

    let state = web::Data::new(AppState::new(publisher.clone()));
    let json_limit = config.max_body_bytes;

    tracing::info!("Starting HTTP server on {}:{}", config.host, config.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(routes::json_config(json_limit))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(routes::configure)
    })
    .shutdown_timeout(config.shutdown_timeout_secs)
    .bind((config.host.as_str(), config.port))
    .context("Failed to bind HTTP server")?
    .run();

    // actix stops accepting on SIGINT/SIGTERM and drains in-flight requests
    let result = server.await.context("HTTP server error");

    publisher.shutdown().await;
    tracing::info!("ingestion-service stopped");

    result
}
