use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parse_body;
use crate::flashcards::algorithm::{format_interval, preview_intervals};
use crate::flashcards::{CardState, CardWithState, FlashcardStorage, Grade, ReviewStats};
use crate::server::{ApiError, AppState, Session};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CardsQuery {
    pub limit: Option<usize>,
}

/// What pressing a grade button would do
#[derive(Debug, Serialize)]
pub struct GradeOption {
    pub grade: u8,
    pub label: &'static str,
    pub interval: i64,
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct DueCard {
    #[serde(flatten)]
    pub card: CardWithState,
    pub grades: Vec<GradeOption>,
}

#[derive(Debug, Serialize)]
pub struct DueCards {
    pub cards: Vec<DueCard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub card_id: String,
    pub grade: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub state: CardState,
    pub next_review: DateTime<Utc>,
    pub interval: String,
}

fn grade_options(state: &CardState) -> Vec<GradeOption> {
    preview_intervals(state)
        .into_iter()
        .map(|(grade, interval)| GradeOption {
            grade: grade.value(),
            label: grade.label(),
            interval,
            display: format_interval(interval),
        })
        .collect()
}

/// Cards due now for the caller. Without a session every card is new.
pub async fn cards(
    State(state): State<AppState>,
    query: Result<Query<CardsQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<DueCards>, ApiError> {
    let Query(query) = query?;
    let user_id = Session::existing(&headers, &state.config.session).unwrap_or_default();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let due = {
        let db = state.db()?;
        FlashcardStorage::new(db.connection()).due_cards(&user_id, Utc::now(), limit)?
    };

    let cards = due
        .into_iter()
        .map(|card| DueCard {
            grades: grade_options(&card.state),
            card,
        })
        .collect();

    Ok(Json(DueCards { cards }))
}

pub async fn review(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ReviewRequest = parse_body(&body)?;
    let grade = Grade::new(request.grade)?;

    let session = Session::resolve(&headers, &state.config.session);

    let card_state = {
        let db = state.db()?;
        let storage = FlashcardStorage::new(db.connection());
        // Unknown cards are rejected before a user row is created
        storage.get_card(&request.card_id)?;
        db.ensure_user(&session.user_id)?;
        storage.submit_review(&session.user_id, &request.card_id, grade, Utc::now())?
    };

    let response = ReviewResponse {
        next_review: card_state.due_date,
        interval: format_interval(card_state.interval),
        state: card_state,
    };

    Ok(session.respond(&state.config.session, Json(response)))
}

pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReviewStats>, ApiError> {
    let user_id = Session::existing(&headers, &state.config.session).unwrap_or_default();
    let db = state.db()?;
    let stats = FlashcardStorage::new(db.connection()).review_stats(&user_id, Utc::now())?;
    Ok(Json(stats))
}
