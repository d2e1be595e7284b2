use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "ingestion_events_total",
            "Events received by ingestion-service, by result",
        ),
        &["endpoint", "result"],
    )
    .expect("failed to create ingestion_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register ingestion_events_total");
    counter
});

pub fn record_events(endpoint: &str, result: &str, count: usize) {
    EVENTS_TOTAL
        .with_label_values(&[endpoint, result])
        .inc_by(count as u64);
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
