//! # Error Handling
//!
//! The caller-facing error taxonomy and how each kind becomes an HTTP
//! response. Component errors (`ValidationError`, `DecodeError`, …) are
//! `thiserror` enums close to where they happen; they are folded into
//! [`AppError`] at the pipeline boundary through the `From` impls below.
//!
//! ## HTTP Status Code Mapping:
//! - ValidationError/BadRequest → 400 (caller's fault)
//! - NotFound → 404
//! - PayloadTooLarge → 413
//! - DecodeError/ServiceError/Internal → 500
//!
//! ## JSON Response Format:
//! Every error uses the same body as the transcription endpoint:
//! ```json
//! { "success": false, "error": "unsupported format" }
//! ```

use crate::audio::{DecodeError, ValidationError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// Each variant carries the message that ends up in the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Unexpected server-side failure (panics, join errors, I/O while storing)
    Internal(String),

    /// Malformed request (broken multipart body, missing `audio` field)
    BadRequest(String),

    /// Requested route does not exist
    NotFound(String),

    /// Upload rejected by the format validator
    ValidationError(String),

    /// Request body over the configured ceiling
    PayloadTooLarge(String),

    /// Upload could not be decoded/normalized
    DecodeError(String),

    /// Recognition service unreachable or erroring
    ServiceError(String),
}

impl AppError {
    /// Machine-readable error type, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::DecodeError(_) => "decode_error",
            AppError::ServiceError(_) => "service_error",
        }
    }

    /// The message sent to the caller.
    pub fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::DecodeError(msg)
            | AppError::ServiceError(msg) => msg,
        }
    }

    /// Whether the caller is to blame (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            AppError::ServiceError(msg) => write!(f, "Recognition service error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_)
            | AppError::DecodeError(_)
            | AppError::ServiceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.message(),
        }))
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::DecodeError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Multipart framing problems are the client's fault.
impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Multipart error: {}", err))
    }
}
