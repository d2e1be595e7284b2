use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, TextEncoder};

static RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "events_consumer_records_total",
            "Records handled by events-consumer, by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create events_consumer_records_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register events_consumer_records_total");
    counter
});

static ACTIVE_PARTITIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "events_consumer_partition_workers",
        "Partition workers currently running",
    )
    .expect("failed to create events_consumer_partition_workers");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register events_consumer_partition_workers");
    gauge
});

pub fn record_outcome(outcome: &str) {
    RECORDS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_partition_workers(count: usize) {
    ACTIVE_PARTITIONS.set(count as i64);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(serve_metrics))
        .route("/health", web::get().to(health));
}

/// Scrape endpoint for the consumer process. Signals are left to the
/// consumer's own shutdown handling; stop it through the server handle.
pub fn server(host: &str, port: u16) -> std::io::Result<Server> {
    Ok(HttpServer::new(|| App::new().configure(configure))
        .workers(1)
        .disable_signals()
        .bind((host, port))?
        .run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_consumer_counters() {
        record_outcome("persisted");
        set_partition_workers(2);

        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("events_consumer_records_total{outcome=\"persisted\"}"));
        assert!(text.contains("events_consumer_partition_workers"));
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
