pub mod docs;
pub mod verify;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(docs::routes())
        .merge(verify::routes(state))
}
