use crate::error::ServerResult;
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Liveness probe
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness probe: the database lock must be acquirable.
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let db = state.read_db()?;
    Ok(Json(serde_json::json!({
        "status": "ready",
        "images": db.num_images(),
    })))
}

/// Index sizing statistics
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub images: usize,
    pub buckets_in_use: usize,
    pub bucket_members: usize,
    pub largest_bucket: usize,
    pub dirty: bool,
}

/// Bucket population summary for capacity planning.
pub async fn stats(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let (images, sizes) = {
        let db = state.read_db()?;
        (db.num_images(), db.bucket_sizes())
    };

    let dirty = state
        .file()?
        .as_ref()
        .map(|file| file.dirty())
        .unwrap_or(false);

    let buckets_in_use = sizes.iter().filter(|&&len| len > 0).count();
    let bucket_members: usize = sizes.iter().sum();
    let largest_bucket = sizes.iter().copied().max().unwrap_or(0);

    Ok(Json(StatsResponse {
        images,
        buckets_in_use,
        bucket_members,
        largest_bucket,
        dirty,
    }))
}

/// Build/version metadata
pub async fn server_metadata(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}
