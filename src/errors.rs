// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CropsightError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Feature not configured: {0}")]
    NotConfigured(&'static str),
}

impl ResponseError for CropsightError {
    fn error_response(&self) -> HttpResponse {
        match self {
            CropsightError::Storage(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Storage error"
                }))
            }
            // Upstream failures are logged at the call site; the client only
            // sees a generic message.
            CropsightError::Provider(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Upstream service error"
                }))
            }
            CropsightError::ImageProcessing(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Image processing error",
                    "message": self.to_string()
                }))
            }
            CropsightError::Serialization(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Data processing error"
                }))
            }
            CropsightError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": self.to_string()
            })),
            CropsightError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": self.to_string()
            })),
            CropsightError::NotConfigured(feature) => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": format!("{feature} is not configured")
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            CropsightError::Validation("Location required".into())
                .error_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CropsightError::Provider("timeout".into())
                .error_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            CropsightError::NotConfigured("detection")
                .error_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            CropsightError::NotFound("no such detection".into())
                .error_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
