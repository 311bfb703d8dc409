//! Learning-path catalogs
//!
//! A catalog is a TOML document describing one path with its skills,
//! prerequisite edges and lessons, plus any flashcards that go with it:
//!
//! ```toml
//! [path]
//! slug = "backend-api"
//! title = "Backend API Development"
//!
//! [[skills]]
//! id = "nodejs"
//! name = "Node.js"
//!
//! [[edges]]
//! from = "nodejs"
//! to = "express"
//!
//! [[lessons]]
//! id = "node-intro"
//! skill = "nodejs"
//! title = "Node.js Fundamentals"
//! content = "# Node.js Fundamentals"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path as FsPath;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::graph::{topological_order, Edge, GraphError};
use crate::flashcards::{self, Flashcard};
use crate::storage::{self, Database, Lesson, Path, QuizQuestion, Resource, Skill, SkillEdge, StorageError};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),

    #[error("Invalid prerequisites: {0}")]
    Graph(#[from] GraphError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPath {
    /// Defaults to the slug
    pub id: Option<String>,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSkill {
    pub id: String,
    pub name: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEdge {
    /// Defaults to `"{from}->{to}"`
    pub id: Option<String>,
    pub from: String,
    pub to: String,
}

impl CatalogEdge {
    pub fn edge_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.from, self.to))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogLesson {
    pub id: String,
    pub skill: String,
    pub title: String,
    #[serde(default)]
    pub order: i32,
    pub content: String,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogCard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub skill: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub path: Option<CatalogPath>,
    #[serde(default)]
    pub skills: Vec<CatalogSkill>,
    #[serde(default)]
    pub edges: Vec<CatalogEdge>,
    #[serde(default)]
    pub lessons: Vec<CatalogLesson>,
    #[serde(default)]
    pub flashcards: Vec<CatalogCard>,
}

/// Counts of rows written by an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub path: Option<String>,
    pub skills: usize,
    pub edges: usize,
    pub lessons: usize,
    pub flashcards: usize,
    /// Skills, edges and lessons of the path dropped from the catalog
    pub removed: usize,
}

impl Catalog {
    pub fn parse(text: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(file: &FsPath) -> Result<Self> {
        let text = fs::read_to_string(file)?;
        Self::parse(&text)
    }

    fn path_id(&self) -> Option<String> {
        self.path
            .as_ref()
            .map(|p| p.id.clone().unwrap_or_else(|| p.slug.clone()))
    }

    fn graph_edges(&self) -> Vec<Edge> {
        self.edges.iter().map(|e| Edge::new(e.from.clone(), e.to.clone())).collect()
    }

    /// Check references and that prerequisites form a DAG
    pub fn validate(&self) -> Result<()> {
        if self.path.is_none() && !(self.skills.is_empty() && self.lessons.is_empty()) {
            return Err(CatalogError::Invalid(
                "skills and lessons need a [path] section".to_string(),
            ));
        }

        let mut skill_ids = HashSet::new();
        for skill in &self.skills {
            if !skill_ids.insert(skill.id.as_str()) {
                return Err(CatalogError::Invalid(format!("duplicate skill {}", skill.id)));
            }
        }

        for lesson in &self.lessons {
            if !skill_ids.contains(lesson.skill.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "lesson {} references unknown skill {}",
                    lesson.id, lesson.skill
                )));
            }
            for question in &lesson.quiz {
                if question.correct_index >= question.choices.len() {
                    return Err(CatalogError::Invalid(format!(
                        "question {} in lesson {} has no choice {}",
                        question.id, lesson.id, question.correct_index
                    )));
                }
            }
        }

        for card in &self.flashcards {
            if let Some(skill) = &card.skill {
                if !skill_ids.contains(skill.as_str()) {
                    return Err(CatalogError::Invalid(format!(
                        "flashcard {} references unknown skill {}",
                        card.id, skill
                    )));
                }
            }
        }

        let nodes: Vec<String> = self.skills.iter().map(|s| s.id.clone()).collect();
        topological_order(&nodes, &self.graph_edges())?;

        Ok(())
    }

    /// Write the catalog into the database in a single transaction.
    /// Rows that already exist are refreshed with the catalog content, and
    /// rows of the path that the catalog no longer lists are removed.
    pub fn import(&self, db: &mut Database) -> Result<ImportSummary> {
        let path_id = self.path_id();
        let tx = db.connection_mut().transaction()?;
        let mut summary = ImportSummary::default();

        if let (Some(path), Some(path_id)) = (&self.path, &path_id) {
            storage::upsert_path(
                &tx,
                &Path {
                    id: path_id.clone(),
                    slug: path.slug.clone(),
                    title: path.title.clone(),
                    summary: path.summary.clone(),
                },
            )?;
            summary.path = Some(path.slug.clone());
            summary.removed = self.prune(&tx, path_id)?;

            for skill in &self.skills {
                storage::upsert_skill(
                    &tx,
                    &Skill {
                        id: skill.id.clone(),
                        path_id: path_id.clone(),
                        name: skill.name.clone(),
                        summary: skill.summary.clone(),
                    },
                )?;
                summary.skills += 1;
            }

            for edge in &self.edges {
                storage::upsert_edge(
                    &tx,
                    &SkillEdge {
                        id: edge.edge_id(),
                        from_id: edge.from.clone(),
                        to_id: edge.to.clone(),
                    },
                )?;
                summary.edges += 1;
            }

            for lesson in &self.lessons {
                storage::upsert_lesson(
                    &tx,
                    &Lesson {
                        id: lesson.id.clone(),
                        skill_id: lesson.skill.clone(),
                        path_id: path_id.clone(),
                        title: lesson.title.clone(),
                        content_md: lesson.content.clone(),
                        order: lesson.order,
                        quiz: lesson.quiz.clone(),
                        resources: lesson.resources.clone(),
                        tasks: lesson.tasks.clone(),
                    },
                )?;
                summary.lessons += 1;
            }
        }

        for (position, card) in self.flashcards.iter().enumerate() {
            let mut flashcard = Flashcard::new(card.id.clone(), card.front.clone(), card.back.clone());
            flashcard.tags = card.tags.clone();
            flashcard.skill_id = card.skill.clone();
            flashcard.position = position as i32;
            flashcards::upsert_card(&tx, &flashcard)?;
            summary.flashcards += 1;
        }

        tx.commit()?;

        log::info!(
            "Imported catalog {}: {} skills, {} edges, {} lessons, {} flashcards, {} stale rows removed",
            summary.path.as_deref().unwrap_or("(flashcards only)"),
            summary.skills,
            summary.edges,
            summary.lessons,
            summary.flashcards,
            summary.removed
        );

        Ok(summary)
    }

    /// Delete the path's edges, lessons and skills that this catalog no
    /// longer lists, so the stored graph matches the validated one.
    fn prune(&self, conn: &Connection, path_id: &str) -> Result<usize> {
        let edge_ids: HashSet<String> = self.edges.iter().map(CatalogEdge::edge_id).collect();
        let lesson_ids: HashSet<&str> = self.lessons.iter().map(|l| l.id.as_str()).collect();
        let skill_ids: HashSet<&str> = self.skills.iter().map(|s| s.id.as_str()).collect();

        let mut removed = 0;

        let stored_edges = column_ids(
            conn,
            "SELECT e.id FROM skill_edges e
             JOIN skills f ON f.id = e.from_id
             JOIN skills t ON t.id = e.to_id
             WHERE f.path_id = ?1 OR t.path_id = ?1",
            path_id,
        )?;
        for id in stored_edges.iter().filter(|id| !edge_ids.contains(*id)) {
            removed += conn.execute("DELETE FROM skill_edges WHERE id = ?1", [id])?;
        }

        let stored_lessons = column_ids(conn, "SELECT id FROM lessons WHERE path_id = ?1", path_id)?;
        for id in stored_lessons.iter().filter(|id| !lesson_ids.contains(id.as_str())) {
            removed += conn.execute("DELETE FROM lessons WHERE id = ?1", [id])?;
        }

        let stored_skills = column_ids(conn, "SELECT id FROM skills WHERE path_id = ?1", path_id)?;
        for id in stored_skills.iter().filter(|id| !skill_ids.contains(id.as_str())) {
            removed += conn.execute("DELETE FROM skills WHERE id = ?1", [id])?;
        }

        if removed > 0 {
            log::info!("Removed {} stale rows from path {}", removed, path_id);
        }
        Ok(removed)
    }
}

fn column_ids(conn: &Connection, sql: &str, path_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([path_id], |row| row.get(0))?;
    rows.collect()
}
