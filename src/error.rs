use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::genome::BreedError;

/// Handler errors. Details are logged; clients only see the status text.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid json body: {err}"))
    }
}

impl From<BreedError> for AppError {
    fn from(err: BreedError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<std::fmt::Error> for AppError {
    fn from(err: std::fmt::Error) -> Self {
        Self::Internal(format!("failed rendering view: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => {
                warn!("rejected request: {self}");
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => {
                error!("handler error: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}
