//! Focus read routes.
//!
//! - `GET /active_stream`: focus name as plain text, empty when none
//! - `GET /stream_key/{key}`: owner record for a stream key

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::owners::StreamOwner;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/active_stream", get(active_stream))
        .route("/stream_key/{key}", get(stream_key))
}

/// Served from the engine's watch channel; never waits on a rotation.
async fn active_stream(State(state): State<AppState>) -> String {
    state.focus.focus_name()
}

async fn stream_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<StreamOwner>> {
    let owner = state.owners.owner_of(&key).await?;
    Ok(Json(owner))
}
