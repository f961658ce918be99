use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::{QueryParams, UserId};
use wavedb::signature_from_file;

/// Similarity query request. The probe is either an image file on the
/// server host or an already-stored image referenced by user ID.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Probe image file path
    #[serde(default)]
    pub path: Option<String>,

    /// Probe by stored image instead of a file
    #[serde(default)]
    pub user_id: Option<UserId>,

    /// Maximum number of hits
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Drop hits scoring below this value
    #[serde(default)]
    pub min_score: Option<f64>,

    /// Exclude the probe image itself from the result (user-ID probes only)
    #[serde(default)]
    pub skip_self: bool,
}

fn default_limit() -> usize {
    10
}

/// Single ranked hit
#[derive(Debug, Serialize)]
pub struct QueryHitResponse {
    pub user_id: UserId,
    pub score: f64,
    pub rank: usize,
}

/// Query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub total: usize,
    pub hits: Vec<QueryHitResponse>,
}

/// Rank stored images by similarity to the probe.
pub async fn query_images(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<QueryRequest>,
) -> ServerResult<impl IntoResponse> {
    let mut params = match (&request.path, request.user_id) {
        (Some(path), None) => {
            let extracted = signature_from_file(path)?;
            QueryParams::new(extracted.signature, extracted.dc, request.limit)
        }
        (None, Some(user_id)) => {
            let db = state.read_db()?;
            let record = db.image_record(user_id)?;
            let mut params = QueryParams::new(record.signature, record.dc, request.limit);
            if request.skip_self {
                params.exclude = Some([user_id].into_iter().collect());
            }
            params
        }
        _ => {
            return Err(ServerError::BadRequest(
                "provide exactly one of path or user_id".to_string(),
            ))
        }
    };
    params.min_score = request.min_score;

    let hits = state.read_db()?.query(&params);

    let hits: Vec<QueryHitResponse> = hits
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| QueryHitResponse {
            user_id: hit.user_id,
            score: hit.score,
            rank: rank + 1,
        })
        .collect();

    Ok(Json(QueryResponse {
        total: hits.len(),
        hits,
    }))
}

/// Save response
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub records: usize,
}

/// Flush pending persistence changes to disk.
pub async fn save(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let records = state.flush()?;
    tracing::info!(records, "Saved signature file");
    Ok(Json(SaveResponse { records }))
}
