use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use store::{PersistError, StoreError};
use wavedb::PipelineError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Request timeout")]
    Timeout,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::IdNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyHaveId(_) => StatusCode::CONFLICT,
        StoreError::CapacityExceeded => StatusCode::INSUFFICIENT_STORAGE,
    }
}

impl ServerError {
    /// Get HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Store(err) => store_status(err),
            ServerError::Pipeline(PipelineError::Store(err)) => store_status(err),
            ServerError::Pipeline(PipelineError::Decode(_))
            | ServerError::Pipeline(PipelineError::DegenerateImage { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Persist(PersistError::IdNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Persist(PersistError::AlreadyHaveId(_)) => StatusCode::CONFLICT,
            ServerError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Timeout => "REQUEST_TIMEOUT",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::NotFound => "NOT_FOUND",
            ServerError::Store(StoreError::IdNotFound(_))
            | ServerError::Pipeline(PipelineError::Store(StoreError::IdNotFound(_))) => {
                "ID_NOT_FOUND"
            }
            ServerError::Store(StoreError::AlreadyHaveId(_))
            | ServerError::Pipeline(PipelineError::Store(StoreError::AlreadyHaveId(_))) => {
                "ALREADY_HAVE_ID"
            }
            ServerError::Store(StoreError::CapacityExceeded)
            | ServerError::Pipeline(PipelineError::Store(StoreError::CapacityExceeded)) => {
                "CAPACITY_EXCEEDED"
            }
            ServerError::Pipeline(PipelineError::Decode(_)) => "DECODE_ERROR",
            ServerError::Pipeline(PipelineError::DegenerateImage { .. }) => "DEGENERATE_IMAGE",
            ServerError::Persist(_) => "PERSIST_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Config(format!("Invalid address: {err}"))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {err}"))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}
