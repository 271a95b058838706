use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::rooms::RoomId;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("transport failure: {0}")]
    Transport(#[from] axum::Error),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedEnvelope(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RoomNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Room not found" })),
            )
                .into_response(),
            err => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
