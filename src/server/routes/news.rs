use axum::{extract::State, Json};

use crate::news::NewsDigest;
use crate::server::AppState;

pub async fn latest(State(state): State<AppState>) -> Json<NewsDigest> {
    Json(state.news.latest().await)
}
