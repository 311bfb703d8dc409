use axum::{
    body::Bytes,
    extract::{Path as UrlParam, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use super::parse_body;
use crate::markdown::{render_lesson, Heading};
use crate::server::{ApiError, AppState, Session};
use crate::storage::{LessonProgress, Resource};

/// A quiz question without its answer
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub question: String,
    pub choices: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub id: String,
    pub skill_id: String,
    pub path_id: String,
    pub title: String,
    pub order: i32,
    pub html: String,
    pub outline: Vec<Heading>,
    pub code_languages: Vec<String>,
    pub quiz: Vec<QuestionView>,
    pub resources: Vec<Resource>,
    pub tasks: Vec<String>,
    pub progress: Option<LessonProgress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: String,
    pub choice: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_index: usize,
    pub explanation: Option<String>,
}

fn lesson_not_found() -> ApiError {
    ApiError::NotFound("lesson not found".to_string())
}

pub async fn show(
    State(state): State<AppState>,
    UrlParam(id): UrlParam<String>,
    headers: HeaderMap,
) -> Result<Json<LessonView>, ApiError> {
    let user_id = Session::existing(&headers, &state.config.session);

    let (lesson, progress) = {
        let db = state.db()?;
        let lesson = db.get_lesson(&id)?.ok_or_else(lesson_not_found)?;
        let progress = match &user_id {
            Some(user_id) => db.get_progress(user_id, &lesson.id)?,
            None => None,
        };
        (lesson, progress)
    };

    let rendered = render_lesson(&lesson.content_md);

    Ok(Json(LessonView {
        id: lesson.id,
        skill_id: lesson.skill_id,
        path_id: lesson.path_id,
        title: lesson.title,
        order: lesson.order,
        html: rendered.html,
        outline: rendered.outline,
        code_languages: rendered.code_languages,
        quiz: lesson
            .quiz
            .into_iter()
            .map(|q| QuestionView {
                id: q.id,
                question: q.question,
                choices: q.choices,
            })
            .collect(),
        resources: lesson.resources,
        tasks: lesson.tasks,
        progress,
    }))
}

/// Check a multiple-choice answer
pub async fn answer(
    State(state): State<AppState>,
    UrlParam(id): UrlParam<String>,
    body: Bytes,
) -> Result<Json<AnswerResult>, ApiError> {
    let request: AnswerRequest = parse_body(&body)?;

    let lesson = state.db()?.get_lesson(&id)?.ok_or_else(lesson_not_found)?;
    let question = lesson
        .quiz
        .into_iter()
        .find(|q| q.id == request.question_id)
        .ok_or_else(|| ApiError::NotFound("question not found".to_string()))?;

    if request.choice >= question.choices.len() {
        return Err(ApiError::BadRequest(format!(
            "choice must be below {}",
            question.choices.len()
        )));
    }

    Ok(Json(AnswerResult {
        correct: request.choice == question.correct_index,
        correct_index: question.correct_index,
        explanation: question.explanation,
    }))
}
