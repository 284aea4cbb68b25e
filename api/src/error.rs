//! Mapping of pipeline errors to HTTP responses

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use modeltrainer_core::TrainerError;
use modeltrainer_databases::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Trainer(#[from] TrainerError),

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Trainer(e) => match e {
                TrainerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                TrainerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                TrainerError::InvalidDataset(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TrainerError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
                TrainerError::TrainingFailed(_)
                | TrainerError::CorruptArtifact(_)
                | TrainerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Trainer(e) => e.category(),
            ApiError::Unauthorized => "unauthorized",
            ApiError::BodyTooLarge(_) => "payload_too_large",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show the caller; storage details stay in the logs
    fn detail(&self) -> String {
        match self {
            ApiError::Trainer(TrainerError::Persistence(_)) => {
                "Failed to save the model. Please try again.".to_string()
            }
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn join(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {}", err))
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Trainer(TrainerError::Persistence(err))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::BodyTooLarge(err.body_text())
        } else {
            ApiError::Trainer(TrainerError::InvalidRequest(err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} ({}): {}", status, self.category(), self);
        }

        let body = json!({
            "status": "error",
            "category": self.category(),
            "detail": self.detail(),
        });
        (status, Json(body)).into_response()
    }
}
