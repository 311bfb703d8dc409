//! Lesson progress updates and per-skill aggregation

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::graph::{prerequisites, Edge, NodeId};
use crate::storage::{Lesson, ProgressStatus, Skill};

#[derive(Error, Debug, PartialEq)]
pub enum ProgressError {
    #[error("lessonId required")]
    MissingLessonId,

    #[error("lessonId must be a string")]
    InvalidLessonId,

    #[error("percent must be a number, got {0}")]
    InvalidPercent(String),

    #[error("unknown status {0}")]
    InvalidStatus(String),
}

/// A validated progress write for one lesson
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub lesson_id: String,
    pub percent: u8,
    pub status: ProgressStatus,
}

impl ProgressUpdate {
    /// Validate a request body. Anything that is not a JSON object is treated
    /// as an empty object, so malformed bodies surface as a missing lessonId.
    pub fn from_json(body: &Value) -> Result<Self, ProgressError> {
        let empty = serde_json::Map::new();
        let fields = body.as_object().unwrap_or(&empty);

        let lesson_id = match fields.get("lessonId") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {
                return Err(ProgressError::MissingLessonId)
            }
            Some(Value::String(s)) if s.is_empty() => return Err(ProgressError::MissingLessonId),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(ProgressError::InvalidLessonId),
        };

        let percent = normalize_percent(fields.get("percent"))?;

        let status = match fields.get("status") {
            None | Some(Value::Null) => ProgressStatus::from_percent(percent),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| ProgressError::InvalidStatus(s.clone()))?,
            Some(other) => return Err(ProgressError::InvalidStatus(other.to_string())),
        };

        Ok(Self {
            lesson_id,
            percent,
            status,
        })
    }
}

/// Coerce a percent field to a whole number in `0..=100`.
///
/// Numbers and numeric strings are accepted, rounded half up, then clamped.
/// A missing or null value counts as 0.
pub fn normalize_percent(value: Option<&Value>) -> Result<u8, ProgressError> {
    let raw = match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed
                    .parse::<f64>()
                    .map_err(|_| ProgressError::InvalidPercent(s.clone()))?
            }
        }
        Some(other) => return Err(ProgressError::InvalidPercent(other.to_string())),
    };

    if raw.is_nan() {
        return Err(ProgressError::InvalidPercent("NaN".to_string()));
    }

    Ok((raw + 0.5).floor().clamp(0.0, 100.0) as u8)
}

/// Mean completion of a skill's lessons; lessons without progress count as 0
pub fn skill_percent<'a>(
    lesson_ids: impl IntoIterator<Item = &'a str>,
    percent_by_lesson: &HashMap<String, u8>,
) -> u8 {
    let (sum, count) = lesson_ids
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), id| {
            (sum + percent_by_lesson.get(id).copied().unwrap_or(0) as u32, count + 1)
        });

    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Locked,
    Available,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProgress {
    pub skill_id: NodeId,
    pub name: String,
    pub percent: u8,
    pub status: SkillStatus,
}

/// Aggregate lesson progress into per-skill percentages and statuses.
///
/// A skill is done at 100%, available once every prerequisite is done, and
/// locked otherwise. Output follows the order of `skills`.
pub fn skill_progress(
    skills: &[Skill],
    lessons: &[Lesson],
    edges: &[Edge],
    percent_by_lesson: &HashMap<String, u8>,
) -> Vec<SkillProgress> {
    let mut lessons_by_skill: HashMap<&str, Vec<&str>> = HashMap::new();
    for lesson in lessons {
        lessons_by_skill
            .entry(lesson.skill_id.as_str())
            .or_default()
            .push(lesson.id.as_str());
    }

    let percents: Vec<u8> = skills
        .iter()
        .map(|skill| {
            let ids = lessons_by_skill.get(skill.id.as_str()).cloned().unwrap_or_default();
            skill_percent(ids, percent_by_lesson)
        })
        .collect();

    let done: HashSet<&str> = skills
        .iter()
        .zip(&percents)
        .filter(|(_, pct)| **pct >= 100)
        .map(|(skill, _)| skill.id.as_str())
        .collect();

    let prereqs = prerequisites(edges);

    skills
        .iter()
        .zip(percents)
        .map(|(skill, percent)| {
            let status = if percent >= 100 {
                SkillStatus::Done
            } else if prereqs
                .get(skill.id.as_str())
                .map_or(true, |before| before.iter().all(|p| done.contains(p)))
            {
                SkillStatus::Available
            } else {
                SkillStatus::Locked
            };

            SkillProgress {
                skill_id: skill.id.clone(),
                name: skill.name.clone(),
                percent,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn skill(id: &str) -> Skill {
        Skill {
            id: id.to_string(),
            path_id: "p".to_string(),
            name: id.to_uppercase(),
            summary: None,
        }
    }

    fn lesson(id: &str, skill_id: &str) -> Lesson {
        Lesson {
            id: id.to_string(),
            skill_id: skill_id.to_string(),
            path_id: "p".to_string(),
            title: id.to_string(),
            content_md: String::new(),
            order: 0,
            quiz: Vec::new(),
            resources: Vec::new(),
            tasks: Vec::new(),
        }
    }

    #[test]
    fn test_missing_lesson_id() {
        assert_eq!(
            ProgressUpdate::from_json(&json!({ "percent": 50 })),
            Err(ProgressError::MissingLessonId)
        );
        assert_eq!(
            ProgressUpdate::from_json(&json!({ "lessonId": "" })),
            Err(ProgressError::MissingLessonId)
        );
        // Non-object bodies behave like {}
        assert_eq!(
            ProgressUpdate::from_json(&json!([1, 2, 3])),
            Err(ProgressError::MissingLessonId)
        );
    }

    #[test]
    fn test_percent_is_rounded_and_clamped() {
        let update = ProgressUpdate::from_json(&json!({ "lessonId": "l1", "percent": 142 })).unwrap();
        assert_eq!(update.percent, 100);
        assert_eq!(update.status, ProgressStatus::Done);

        let update = ProgressUpdate::from_json(&json!({ "lessonId": "l1", "percent": -3 })).unwrap();
        assert_eq!(update.percent, 0);
        assert_eq!(update.status, ProgressStatus::NotStarted);

        let update = ProgressUpdate::from_json(&json!({ "lessonId": "l1", "percent": "49.5" })).unwrap();
        assert_eq!(update.percent, 50);
        assert_eq!(update.status, ProgressStatus::InProgress);

        let update = ProgressUpdate::from_json(&json!({ "lessonId": "l1" })).unwrap();
        assert_eq!(update.percent, 0);
    }

    #[test]
    fn test_non_numeric_percent_rejected() {
        assert!(matches!(
            ProgressUpdate::from_json(&json!({ "lessonId": "l1", "percent": "lots" })),
            Err(ProgressError::InvalidPercent(_))
        ));
        assert!(matches!(
            ProgressUpdate::from_json(&json!({ "lessonId": "l1", "percent": [50] })),
            Err(ProgressError::InvalidPercent(_))
        ));
    }

    #[test]
    fn test_explicit_status_wins() {
        let update = ProgressUpdate::from_json(
            &json!({ "lessonId": "l1", "percent": 100, "status": "IN_PROGRESS" }),
        )
        .unwrap();
        assert_eq!(update.status, ProgressStatus::InProgress);

        assert_eq!(
            ProgressUpdate::from_json(&json!({ "lessonId": "l1", "status": "FINISHED" })),
            Err(ProgressError::InvalidStatus("FINISHED".to_string()))
        );
    }

    #[test]
    fn test_skill_percent_mean() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), 100);
        map.insert("b".to_string(), 50);

        assert_eq!(skill_percent(["a", "b"], &map), 75);
        assert_eq!(skill_percent(["a", "b", "c"], &map), 50);
        assert_eq!(skill_percent(std::iter::empty(), &map), 0);
    }

    #[test]
    fn test_skill_progress_statuses() {
        let skills = vec![skill("node"), skill("express"), skill("rest")];
        let lessons = vec![
            lesson("n1", "node"),
            lesson("e1", "express"),
            lesson("e2", "express"),
            lesson("r1", "rest"),
        ];
        let edges = vec![Edge::new("node", "express"), Edge::new("express", "rest")];

        let mut map = HashMap::new();
        map.insert("n1".to_string(), 100);
        map.insert("e1".to_string(), 100);
        map.insert("e2".to_string(), 1);

        let progress = skill_progress(&skills, &lessons, &edges, &map);
        assert_eq!(progress[0].status, SkillStatus::Done);
        assert_eq!(progress[1].percent, 51);
        assert_eq!(progress[1].status, SkillStatus::Available);
        assert_eq!(progress[2].percent, 0);
        assert_eq!(progress[2].status, SkillStatus::Locked);
    }
}
