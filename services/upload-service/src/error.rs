// /forum-platform/services/upload-service/src/error.rs
// Centralized error handling untuk upload service

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::ErrorResponse;
use crate::validation::ErrorKind;

/// Type alias untuk Result dengan AppError
pub type AppResult<T> = Result<T, AppError>;

/// Application error enum dengan semua possible errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upload ditolak: {0}")]
    Rejected(ErrorKind),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("File tidak ditemukan dalam upload")]
    MissingFile,

    #[error("Terlalu banyak request")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Batas upload concurrent terlampaui")]
    ConcurrentUploadLimit,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Rejected(ErrorKind::SizeExceeded) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Rejected(ErrorKind::UnsupportedType) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Rejected(_) | AppError::BadRequest(_) | AppError::MissingFile => {
                StatusCode::BAD_REQUEST
            }
            AppError::RateLimited { .. } | AppError::ConcurrentUploadLimit => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Storage(_) | AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Error parsing multipart: {}", err))
    }
}

impl IntoResponse for AppError {
    /// Convert AppError ke HTTP response
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_code, message, details) = match &self {
            AppError::Rejected(kind) => (
                kind.code(),
                kind.to_string(),
                Some(serde_json::json!({ "reason": kind })),
            ),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone(), None),
            AppError::MissingFile => ("NO_FILE_FOUND", self.to_string(), None),
            AppError::RateLimited { retry_after_seconds } => (
                "RATE_LIMIT_EXCEEDED",
                "Terlalu banyak request. Silakan coba lagi nanti.".to_string(),
                Some(serde_json::json!({ "retry_after_seconds": retry_after_seconds })),
            ),
            AppError::ConcurrentUploadLimit => ("CONCURRENT_UPLOAD_LIMIT", self.to_string(), None),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                ("STORAGE_ERROR", "Gagal menyimpan file".to_string(), None)
            }
            AppError::Configuration(err) => {
                tracing::error!("Configuration error: {}", err);
                (
                    "CONFIGURATION_ERROR",
                    "Service configuration error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error_code: Some(error_code.to_string()),
            details,
        });

        let mut response = (status, body).into_response();
        if let AppError::RateLimited { retry_after_seconds } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }

        response
    }
}
