//! Shared-secret authentication middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::api_key::keys_match;
use super::error::ApiError;
use crate::AppState;
use crate::constants::API_KEY_HEADER;

/// Rejects requests whose `X-API-Key` header is missing or wrong.
/// Runs before the body is read, so 401 takes precedence over payload errors.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| keys_match(key, &state.config.api_key));

    if !authorized {
        log::warn!(
            "Rejected {} {}: invalid or missing API key",
            request.method(),
            request.uri().path()
        );
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
