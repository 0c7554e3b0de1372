//! API route modules.

pub mod focus;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", focus::router())
        .with_state(state)
}
