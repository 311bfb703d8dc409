pub mod lessons;
pub mod news;
pub mod paths;
pub mod playground;
pub mod progress;
pub mod quiz;

use axum::body::Bytes;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::ApiError;

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Decode a JSON request body, reporting problems as `{ "error": ... }`
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))
}
