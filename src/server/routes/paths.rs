use std::collections::HashMap;

use axum::{
    extract::{Path as UrlParam, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use crate::paths::graph::{layout, topological_order, Edge, LayoutOptions, NodeId, Position};
use crate::paths::progress::{skill_progress, SkillStatus};
use crate::server::{ApiError, AppState, Session};
use crate::storage::{Path, PathSummary, SkillEdge};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonLink {
    pub id: String,
    pub title: String,
    pub order: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub lessons: Vec<LessonLink>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDetail {
    pub path: Path,
    pub skills: Vec<SkillView>,
    pub edges: Vec<SkillEdge>,
    /// Skill ids in prerequisite order
    pub order: Vec<NodeId>,
}

#[derive(Debug, Serialize)]
pub struct NodeData {
    pub label: String,
    pub href: String,
    pub status: SkillStatus,
    pub percent: u8,
}

/// A skill node ready for the path graph
#[derive(Debug, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub position: Position,
    pub data: NodeData,
}

#[derive(Debug, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct PathProgress {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub order: Vec<NodeId>,
}

fn path_not_found() -> ApiError {
    ApiError::NotFound("path not found".to_string())
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<PathSummary>>, ApiError> {
    let db = state.db()?;
    Ok(Json(db.list_paths()?))
}

pub async fn detail(
    State(state): State<AppState>,
    UrlParam(slug): UrlParam<String>,
) -> Result<Json<PathDetail>, ApiError> {
    let db = state.db()?;
    let path = db.get_path_by_slug(&slug)?.ok_or_else(path_not_found)?;
    let skills = db.skills_for_path(&path.id)?;
    let edges = db.edges_for_path(&path.id)?;
    let lessons = db.lessons_for_path(&path.id)?;

    let nodes: Vec<NodeId> = skills.iter().map(|s| s.id.clone()).collect();
    let graph_edges: Vec<Edge> = edges.iter().map(Edge::from).collect();
    let order = topological_order(&nodes, &graph_edges)?;

    // Lessons arrive sorted by skill then order
    let mut lessons_by_skill: HashMap<&str, Vec<LessonLink>> = HashMap::new();
    for lesson in &lessons {
        lessons_by_skill
            .entry(lesson.skill_id.as_str())
            .or_default()
            .push(LessonLink {
                id: lesson.id.clone(),
                title: lesson.title.clone(),
                order: lesson.order,
            });
    }

    let skills = skills
        .into_iter()
        .map(|skill| {
            let lessons = lessons_by_skill.remove(skill.id.as_str()).unwrap_or_default();
            SkillView {
                id: skill.id,
                name: skill.name,
                summary: skill.summary,
                lessons,
            }
        })
        .collect();

    Ok(Json(PathDetail {
        path,
        skills,
        edges,
        order,
    }))
}

/// Skill graph with the caller's progress. Without a session cookie every
/// skill reports 0%.
pub async fn progress(
    State(state): State<AppState>,
    UrlParam(slug): UrlParam<String>,
    headers: HeaderMap,
) -> Result<Json<PathProgress>, ApiError> {
    let user_id = Session::existing(&headers, &state.config.session);

    let db = state.db()?;
    let path = db.get_path_by_slug(&slug)?.ok_or_else(path_not_found)?;
    let skills = db.skills_for_path(&path.id)?;
    let edges = db.edges_for_path(&path.id)?;
    let lessons = db.lessons_for_path(&path.id)?;
    let percent_by_lesson = match &user_id {
        Some(user_id) => db.percent_by_lesson(user_id, &path.id)?,
        None => HashMap::new(),
    };
    drop(db);

    let node_ids: Vec<NodeId> = skills.iter().map(|s| s.id.clone()).collect();
    let graph_edges: Vec<Edge> = edges.iter().map(Edge::from).collect();
    let order = topological_order(&node_ids, &graph_edges)?;

    let mut positions: HashMap<NodeId, Position> = layout(&order, &graph_edges, &LayoutOptions::default())
        .into_iter()
        .map(|node| (node.id, node.position))
        .collect();

    let href = format!("/paths/{}", path.slug);
    let nodes = skill_progress(&skills, &lessons, &graph_edges, &percent_by_lesson)
        .into_iter()
        .map(|progress| GraphNode {
            position: positions
                .remove(&progress.skill_id)
                .unwrap_or(Position { x: 0.0, y: 0.0 }),
            id: progress.skill_id,
            kind: "skill",
            data: NodeData {
                label: progress.name,
                href: href.clone(),
                status: progress.status,
                percent: progress.percent,
            },
        })
        .collect();

    let edges = edges
        .into_iter()
        .map(|edge| GraphEdge {
            id: edge.id,
            source: edge.from_id,
            target: edge.to_id,
        })
        .collect();

    Ok(Json(PathProgress { nodes, edges, order }))
}
