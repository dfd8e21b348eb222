//! Error type for route handlers.
//!
//! Every error renders as `{"status": "error", "message": ...}`. Internal
//! failures are logged with detail and answered with a generic message.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use crate::models::StatusResponse;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    PayloadTooLarge,
    NotFound,
    /// Processing failure; detail is logged, never returned
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Invalid or missing API key"),
            ApiError::BadRequest(message) => write!(f, "{message}"),
            ApiError::PayloadTooLarge => write!(f, "File too large. Maximum size is 16MB"),
            ApiError::NotFound => write!(f, "Endpoint not found"),
            ApiError::Internal => write!(f, "Error processing the certificate"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(StatusResponse::error(self.to_string()))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            log::warn!("Malformed multipart body: {}", err.body_text());
            ApiError::BadRequest("Malformed multipart body".to_string())
        }
    }
}

/// Extension trait for logging errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and return ApiError::Internal
    fn log_500(self, context: &str) -> Result<T, ApiError>;
}

impl<T, E: fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            log::error!("{}: {:#}", context, e);
            ApiError::Internal
        })
    }
}
