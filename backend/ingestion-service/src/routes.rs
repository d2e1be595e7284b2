use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::error::{IngestError, ValidationError};
use crate::handlers::{events, health};
use crate::metrics;
use tracing::error;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1/events")
            .route("", web::post().to(events::post_event))
            .route("/batch", web::post().to(events::post_batch)),
    )
    .route("/health", web::get().to(health::health))
    .route("/metrics", web::get().to(metrics::serve_metrics));
}

/// Bodies that are not JSON never reach the validator; report them as
/// `INVALID_REQUEST` like any other malformed input. A body that could not be
/// read at all is an internal failure.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    if let JsonPayloadError::Payload(e) = &err {
        error!(path = %req.path(), error = %e, "Failed to read request body");
        return IngestError::Internal(e.to_string()).into();
    }

    let message = match &err {
        JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            "Request body is too large".to_string()
        }
        other => format!("Body must be valid JSON: {}", other),
    };
    IngestError::Validation(ValidationError::new(message, None)).into()
}
