//! Unauthenticated informational endpoints

use axum::{Json, Router, routing::get};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::AppState;
use crate::models::{IndexResponse, StatusResponse};
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

/// GET / - Describe the available endpoints
async fn index() -> Json<IndexResponse> {
    let endpoints = BTreeMap::from([
        ("/".to_string(), "GET - API documentation".to_string()),
        ("/health".to_string(), "GET - Health check".to_string()),
        (
            "/verify".to_string(),
            "POST - Verify a medical certificate image (multipart field 'file', header 'X-API-Key')"
                .to_string(),
        ),
    ]);

    Json(IndexResponse {
        status: "success".to_string(),
        message: "Medical Certificate Verification API".to_string(),
        endpoints,
    })
}

/// GET /health - Liveness check
async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::new("healthy", "Service is running"))
}

/// Fallback for unknown paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
