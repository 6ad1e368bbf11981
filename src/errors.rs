// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IconError {
    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

impl IconError {
    /// Message shown inline next to the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            IconError::Analysis(msg) | IconError::Generation(msg) if !msg.is_empty() => {
                msg.clone()
            }
            IconError::Analysis(_) => "Analysis failed".to_string(),
            IconError::Generation(_) => "Generation failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for IconError {
    fn from(e: serde_json::Error) -> Self {
        IconError::Serialization(e.to_string())
    }
}

impl From<redis::RedisError> for IconError {
    fn from(e: redis::RedisError) -> Self {
        IconError::Storage(e.to_string())
    }
}

impl ResponseError for IconError {
    fn error_response(&self) -> HttpResponse {
        match self {
            IconError::Analysis(_) => HttpResponse::BadGateway().json(serde_json::json!({
                "error": "Analysis error",
                "message": self.to_string()
            })),
            IconError::Generation(_) => HttpResponse::BadGateway().json(serde_json::json!({
                "error": "Generation error",
                "message": self.to_string()
            })),
            IconError::Storage(_) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Database error",
                "message": self.to_string()
            })),
            IconError::Serialization(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Data processing error",
                    "message": self.to_string()
                }))
            }
            IconError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            IconError::InvalidProvider(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Invalid provider",
                    "message": self.to_string()
                }))
            }
            IconError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Not found",
                "message": self.to_string()
            })),
            IconError::ImageProcessing(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Image processing error",
                    "message": self.to_string()
                }))
            }
        }
    }
}
