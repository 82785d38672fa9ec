use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

/// Raised when every extraction attempt for a document came back empty or failed.
#[derive(Error, Debug)]
#[error("No text content could be extracted from the document")]
pub struct ExtractionError {
    pub media_type: String,
    pub path: PathBuf,
}

/// A single extraction strategy failed. The dispatcher consumes these and
/// moves on to the next strategy in the chain.
#[derive(Error, Debug, Clone)]
#[error("{strategy} conversion failed: {message}")]
pub struct ConversionError {
    pub strategy: &'static str,
    pub message: String,
}

impl ConversionError {
    pub fn new(strategy: &'static str, message: impl Into<String>) -> Self {
        Self {
            strategy,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("LLM API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to reach LLM API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed LLM response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("File too large: {size}MB exceeds limit of {limit}MB")]
    FileTooLarge { size: usize, limit: usize },

    #[error("File type {mime_type} is not supported. Supported types: PDF, Word, PowerPoint, Excel, Text, CSV, RTF, and OpenDocument formats.")]
    UnsupportedMediaType { mime_type: String },

    #[error("Invalid file: {message}")]
    InvalidFile { message: String },

    #[error("Rate limit exceeded: maximum concurrent requests reached")]
    RateLimitExceeded,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Answer generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("No file uploaded")]
    MissingFile,

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            AppError::InvalidFile { .. } => "INVALID_FILE",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::Extraction(_) => "EXTRACTION_FAILED",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Timeout => "REQUEST_TIMEOUT",
            AppError::Internal { .. } => "INTERNAL_ERROR",
            AppError::MissingFile => "MISSING_FILE",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::ConfigError { .. } => "CONFIG_ERROR",
            AppError::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::InvalidFile { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Llm(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::ConfigError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let request_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        tracing::error!(
            error_code = error_code,
            status_code = %status,
            request_id = %request_id,
            error_message = %message,
            "API error occurred"
        );

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
                "request_id": request_id,
                "timestamp": timestamp
            }
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError {
            message: format!("JSON parsing error: {}", err),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::DatabaseError {
            message: err.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal {
            message: format!("Background task failed: {}", err),
        }
    }
}

// Helper methods for creating specific errors
impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::ConfigError {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}
