use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::UserId;
use wavedb::signature_from_file;

/// Add-image request
#[derive(Debug, Deserialize)]
pub struct AddImageRequest {
    /// Path of the image file on the server host
    pub path: String,

    /// Optional caller-assigned user ID; generated when omitted
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Add-image response
#[derive(Debug, Serialize)]
pub struct AddImageResponse {
    pub user_id: UserId,
    pub width: u16,
    pub height: u16,
    pub num_images: usize,
}

/// Decode an image file, extract its signature, and insert it.
///
/// The signature is extracted outside the database lock; only the insert
/// itself takes exclusive access. When a database file is configured the
/// record is staged there as well, and a persistence failure rolls the
/// in-memory insert back so both views stay aligned.
pub async fn add_image(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AddImageRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.path.trim().is_empty() {
        return Err(ServerError::BadRequest("path must not be empty".to_string()));
    }

    let extracted = signature_from_file(&request.path)?;

    let mut db = state.write_db()?;
    let user_id = match request.user_id {
        Some(uid) => uid,
        None => db.next_id(),
    };
    let record = extracted.into_record(user_id);
    db.add_image(record.clone())?;
    let num_images = db.num_images();

    if let Some(file) = state.file()?.as_mut() {
        if let Err(err) = file.append_image(record.clone()) {
            let _ = db.remove_image(user_id);
            return Err(err.into());
        }
    }

    tracing::info!(user_id, path = %request.path, "Indexed image");

    Ok(Json(AddImageResponse {
        user_id,
        width: record.width,
        height: record.height,
        num_images,
    }))
}

/// Stored image metadata
#[derive(Debug, Serialize)]
pub struct ImageInfoResponse {
    pub user_id: UserId,
    pub width: u16,
    pub height: u16,
    pub dc: [f64; 3],
}

/// Look up a stored image by user ID.
pub async fn get_image(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<UserId>,
) -> ServerResult<impl IntoResponse> {
    let db = state.read_db()?;
    let stored = db.get_image(user_id)?;
    Ok(Json(ImageInfoResponse {
        user_id: stored.user_id,
        width: stored.width,
        height: stored.height,
        dc: stored.dc,
    }))
}

/// Delete response
#[derive(Debug, Serialize)]
pub struct RemoveImageResponse {
    pub user_id: UserId,
    pub num_images: usize,
}

/// Remove a stored image by user ID.
pub async fn delete_image(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<UserId>,
) -> ServerResult<impl IntoResponse> {
    let mut db = state.write_db()?;
    db.remove_image(user_id)?;
    let num_images = db.num_images();

    if let Some(file) = state.file()?.as_mut() {
        file.remove_image(user_id)?;
    }

    tracing::info!(user_id, "Removed image");

    Ok(Json(RemoveImageResponse {
        user_id,
        num_images,
    }))
}
