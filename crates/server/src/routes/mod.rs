pub mod health;
pub mod images;
pub mod query;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API info for the root route
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "wavedb",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Content-based image similarity database",
        "endpoints": {
            "health": "GET /health",
            "ready": "GET /ready",
            "add_image": "POST /api/v1/images",
            "get_image": "GET /api/v1/images/{user_id}",
            "delete_image": "DELETE /api/v1/images/{user_id}",
            "query": "POST /api/v1/query",
            "save": "POST /api/v1/save",
            "stats": "GET /api/v1/stats",
            "metadata": "GET /api/v1/metadata",
        }
    }))
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": "NOT_FOUND",
                "message": "unknown route",
            }
        })),
    )
}
