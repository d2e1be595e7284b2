use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Client input is malformed. Always recoverable by fixing the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    /// Offending field, when one can be named
    pub field: Option<String>,
    pub status: u16,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, field: Option<&str>) -> Self {
        Self {
            message: message.into(),
            field: field.map(str::to_string),
            status: 400,
        }
    }

    /// Prefix the message with the position of the failing batch element,
    /// keeping field and status.
    pub fn at_index(self, index: usize) -> Self {
        Self {
            message: format!("Event at index {} is invalid: {}", index, self.message),
            ..self
        }
    }
}

/// The event could not be put on the log: missing partition key, broker
/// unreachable, or send rejected. `details` never carries the raw client error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct PublishError {
    pub message: String,
    pub details: Value,
}

impl PublishError {
    pub const CODE: &'static str = "KAFKA_PUBLISH_FAILED";

    pub fn new(message: impl Into<String>, details: Value) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> u16 {
        503
    }
}

/// Everything the HTTP boundary can report for an ingestion request
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "INVALID_REQUEST",
            IngestError::Publish(_) => PublishError::CODE,
            IngestError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn body(&self) -> ErrorResponse {
        let error = match self {
            IngestError::Validation(err) => ErrorBody {
                code: self.code(),
                message: err.message.clone(),
                details: err
                    .field
                    .as_ref()
                    .map(|field| serde_json::json!({ "field": field })),
            },
            IngestError::Publish(err) => ErrorBody {
                code: self.code(),
                message: err.message.clone(),
                details: Some(err.details.clone()),
            },
            // Internal detail stays in the logs
            IngestError::Internal(_) => ErrorBody {
                code: self.code(),
                message: "An unexpected error occurred".to_string(),
                details: None,
            },
        };
        ErrorResponse { error }
    }
}

impl ResponseError for IngestError {
    fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Validation(err) => {
                StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            IngestError::Publish(err) => {
                StatusCode::from_u16(err.status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            }
            IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_at_index_keeps_field_and_status() {
        let err = ValidationError::new("timestamp is required", Some("timestamp")).at_index(3);
        assert_eq!(
            err.message,
            "Event at index 3 is invalid: timestamp is required"
        );
        assert_eq!(err.field.as_deref(), Some("timestamp"));
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_status_codes() {
        let validation: IngestError = ValidationError::new("bad", None).into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let publish: IngestError = PublishError::new("down", json!({})).into();
        assert_eq!(publish.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let internal = IngestError::Internal("boom".to_string());
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_body_shape() {
        let err: IngestError =
            ValidationError::new("event_type is required", Some("event_type")).into();
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            json!({
                "error": {
                    "code": "INVALID_REQUEST",
                    "message": "event_type is required",
                    "details": {"field": "event_type"}
                }
            })
        );
    }

    #[test]
    fn test_validation_body_without_field_omits_details() {
        let err: IngestError = ValidationError::new("Body must be a JSON object", None).into();
        let body = serde_json::to_value(err.body()).unwrap();
        assert!(body["error"].get("details").is_none());
    }

    #[test]
    fn test_internal_body_hides_detail() {
        let err = IngestError::Internal("connection string postgres://secret".to_string());
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("secret"));
    }
}
