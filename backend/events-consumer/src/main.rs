use anyhow::{Context, Result};
use db_pool::{create_pool, DbConfig};
use events_consumer::config::ConsumerConfig;
use events_consumer::logging::init_tracing;
use events_consumer::metrics;
use events_consumer::shutdown::{listen_for_signals, Shutdown};
use events_consumer::EventsConsumer;
use idempotent_sink::{EventSink, PgEventSink, MIGRATOR};
use std::sync::Arc;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = ConsumerConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_format, "info,events_consumer=debug,idempotent_sink=debug");

    info!("Starting events-consumer");

    let db_config = DbConfig::from_env("events-consumer");
    db_config.log_config();
    let pool = create_pool(db_config)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if config.run_migrations {
        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations applied");
    }

    let sink: Arc<dyn EventSink> = Arc::new(PgEventSink::new(pool));

    let metrics_server = match metrics::server(&config.metrics_host, config.metrics_port) {
        Ok(server) => server,
        Err(e) => {
            sink.close().await;
            return Err(e).context("Failed to bind metrics endpoint");
        }
    };
    info!(
        "Serving metrics on {}:{}",
        config.metrics_host, config.metrics_port
    );

    // Unreachable broker at startup is fatal
    let consumer = match EventsConsumer::connect(config, sink.clone()).await {
        Ok(consumer) => consumer,
        Err(e) => {
            sink.close().await;
            return Err(e).context("Failed to start Kafka consumer");
        }
    };

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(e) = listen_for_signals(shutdown).await {
            error!(error = %e, "Failed to install signal handlers");
        }
    });

    let metrics_handle = metrics_server.handle();
    let consume = async move {
        let result = consumer.run(shutdown_rx).await;
        metrics_handle.stop(true).await;
        result
    };
    let (result, served) = tokio::join!(consume, metrics_server);

    if let Err(e) = served {
        warn!(error = %e, "Metrics endpoint stopped with error");
    }
    let snapshot = result.context("Events consumer failed")?;

    info!(records = snapshot.total(), "events-consumer stopped");
    Ok(())
}
