use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::flashcards::{FlashcardStorageError, InvalidGrade};
use crate::paths::{GraphError, ProgressError};
use crate::storage::StorageError;

/// Error returned by API handlers, rendered as `{ "error": message }`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                log::error!("Request failed: {}", detail);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<FlashcardStorageError> for ApiError {
    fn from(e: FlashcardStorageError) -> Self {
        match e {
            FlashcardStorageError::CardNotFound(_) => ApiError::NotFound("card not found".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProgressError> for ApiError {
    fn from(e: ProgressError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<InvalidGrade> for ApiError {
    fn from(e: InvalidGrade) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// Stored prerequisites that do not form a DAG are a data problem, not a
/// client one
impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
