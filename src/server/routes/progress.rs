use axum::{body::Bytes, extract::State, http::HeaderMap, response::Response, Json};
use serde_json::{json, Value};

use crate::paths::ProgressUpdate;
use crate::server::{ApiError, AppState, Session};

/// Record lesson progress for the caller, issuing a session cookie on first
/// use. A body that is not valid JSON is treated as `{}`.
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let value: Value =
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::Object(Default::default()));
    let update = ProgressUpdate::from_json(&value)?;

    let session = Session::resolve(&headers, &state.config.session);

    let progress = {
        let db = state.db()?;
        if !db.lesson_exists(&update.lesson_id)? {
            return Err(ApiError::NotFound("lesson not found".to_string()));
        }
        db.ensure_user(&session.user_id)?;
        db.upsert_progress(&session.user_id, &update.lesson_id, update.percent, update.status)?
    };

    log::debug!(
        "Progress {} -> {}% for {}",
        progress.lesson_id,
        progress.percent,
        session.user_id
    );

    Ok(session.respond(
        &state.config.session,
        Json(json!({ "ok": true, "progress": progress })),
    ))
}
