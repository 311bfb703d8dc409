//! SQLite storage for the learning catalog, users and lesson progress.
//!
//! The schema is created on open. Flashcard tables live in the same file and
//! are accessed through [`crate::flashcards::FlashcardStorage`].

use std::collections::HashMap;
use std::path::Path as FsPath;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::models::*;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, StorageError>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS paths (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        summary TEXT
    );

    CREATE TABLE IF NOT EXISTS skills (
        id TEXT PRIMARY KEY,
        path_id TEXT NOT NULL REFERENCES paths(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        summary TEXT
    );

    CREATE TABLE IF NOT EXISTS skill_edges (
        id TEXT PRIMARY KEY,
        from_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
        to_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
        UNIQUE (from_id, to_id)
    );

    CREATE TABLE IF NOT EXISTS lessons (
        id TEXT PRIMARY KEY,
        skill_id TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
        path_id TEXT NOT NULL REFERENCES paths(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        content_md TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        quiz TEXT NOT NULL DEFAULT '[]',
        resources TEXT NOT NULL DEFAULT '[]',
        tasks TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS lesson_progress (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        lesson_id TEXT NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
        percent INTEGER NOT NULL,
        status TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, lesson_id)
    );

    CREATE TABLE IF NOT EXISTS flashcards (
        id TEXT PRIMARY KEY,
        front TEXT NOT NULL,
        back TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        skill_id TEXT REFERENCES skills(id) ON DELETE SET NULL,
        position INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS card_states (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        card_id TEXT NOT NULL REFERENCES flashcards(id) ON DELETE CASCADE,
        ease_factor REAL NOT NULL,
        interval INTEGER NOT NULL,
        repetitions INTEGER NOT NULL,
        due_date TEXT NOT NULL,
        review_count INTEGER NOT NULL,
        correct_count INTEGER NOT NULL,
        status TEXT NOT NULL,
        PRIMARY KEY (user_id, card_id)
    );

    CREATE TABLE IF NOT EXISTS review_log (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        card_id TEXT NOT NULL REFERENCES flashcards(id) ON DELETE CASCADE,
        grade INTEGER NOT NULL,
        interval INTEGER NOT NULL,
        ease_factor REAL NOT NULL,
        reviewed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_skills_path_id ON skills(path_id);
    CREATE INDEX IF NOT EXISTS idx_lessons_skill_id ON lessons(skill_id);
    CREATE INDEX IF NOT EXISTS idx_card_states_due ON card_states(user_id, due_date);
    CREATE INDEX IF NOT EXISTS idx_review_log_user ON review_log(user_id, reviewed_at);
"#;

/// Handle to the CodeStudy database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &FsPath) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Default location under the user's local data directory
    pub fn default_path() -> Result<std::path::PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("codestudy").join("codestudy.db"))
            .ok_or(StorageError::DataDirNotFound)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    // ==================== Catalog reads ====================

    /// List every path with skill and lesson counts, ordered by title
    pub fn list_paths(&self) -> Result<Vec<PathSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.slug, p.title, p.summary,
                    (SELECT COUNT(*) FROM skills s WHERE s.path_id = p.id),
                    (SELECT COUNT(*) FROM lessons l
                        JOIN skills s ON s.id = l.skill_id WHERE s.path_id = p.id)
             FROM paths p ORDER BY p.title",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PathSummary {
                path: path_from_row(row)?,
                skill_count: row.get::<_, i64>(4)? as usize,
                lesson_count: row.get::<_, i64>(5)? as usize,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_path_by_slug(&self, slug: &str) -> Result<Option<Path>> {
        let path = self
            .conn
            .query_row(
                "SELECT id, slug, title, summary FROM paths WHERE slug = ?1",
                params![slug],
                path_from_row,
            )
            .optional()?;
        Ok(path)
    }

    /// Skills of a path in insertion order
    pub fn skills_for_path(&self, path_id: &str) -> Result<Vec<Skill>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path_id, name, summary FROM skills WHERE path_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![path_id], |row| {
            Ok(Skill {
                id: row.get(0)?,
                path_id: row.get(1)?,
                name: row.get(2)?,
                summary: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Prerequisite edges whose endpoints both belong to the path
    pub fn edges_for_path(&self, path_id: &str) -> Result<Vec<SkillEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.from_id, e.to_id FROM skill_edges e
             JOIN skills f ON f.id = e.from_id
             JOIN skills t ON t.id = e.to_id
             WHERE f.path_id = ?1 AND t.path_id = ?1
             ORDER BY e.rowid",
        )?;
        let rows = stmt.query_map(params![path_id], |row| {
            Ok(SkillEdge {
                id: row.get(0)?,
                from_id: row.get(1)?,
                to_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Lessons reachable through the path's skills, ordered within each skill
    pub fn lessons_for_path(&self, path_id: &str) -> Result<Vec<Lesson>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.skill_id, l.path_id, l.title, l.content_md, l.position,
                    l.quiz, l.resources, l.tasks
             FROM lessons l JOIN skills s ON s.id = l.skill_id
             WHERE s.path_id = ?1
             ORDER BY s.rowid, l.position, l.rowid",
        )?;
        let rows = stmt.query_map(params![path_id], lesson_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>> {
        let lesson = self
            .conn
            .query_row(
                "SELECT id, skill_id, path_id, title, content_md, position, quiz, resources, tasks
                 FROM lessons WHERE id = ?1",
                params![lesson_id],
                lesson_from_row,
            )
            .optional()?;
        Ok(lesson)
    }

    pub fn lesson_exists(&self, lesson_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM lessons WHERE id = ?1",
                params![lesson_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ==================== Catalog writes ====================

    pub fn upsert_path(&self, path: &Path) -> Result<()> {
        upsert_path(&self.conn, path)
    }

    pub fn upsert_skill(&self, skill: &Skill) -> Result<()> {
        upsert_skill(&self.conn, skill)
    }

    pub fn upsert_edge(&self, edge: &SkillEdge) -> Result<()> {
        upsert_edge(&self.conn, edge)
    }

    pub fn upsert_lesson(&self, lesson: &Lesson) -> Result<()> {
        upsert_lesson(&self.conn, lesson)
    }

    // ==================== Users ====================

    /// Make sure a row exists for this id, creating a guest user if needed.
    pub fn ensure_user(&self, user_id: &str) -> Result<User> {
        let guest = User::guest(user_id);
        self.conn.execute(
            "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO NOTHING",
            params![guest.id, guest.email, guest.name, guest.created_at],
        )?;

        let user = self.conn.query_row(
            "SELECT id, email, name, created_at FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )?;
        Ok(user)
    }

    // ==================== Progress ====================

    /// Insert or overwrite the progress row for (user, lesson)
    pub fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        percent: u8,
        status: ProgressStatus,
    ) -> Result<LessonProgress> {
        let progress = LessonProgress {
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            percent,
            status,
            updated_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT INTO lesson_progress (user_id, lesson_id, percent, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                percent = excluded.percent,
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![
                progress.user_id,
                progress.lesson_id,
                progress.percent,
                progress.status.as_str(),
                progress.updated_at,
            ],
        )?;

        Ok(progress)
    }

    pub fn get_progress(&self, user_id: &str, lesson_id: &str) -> Result<Option<LessonProgress>> {
        let progress = self
            .conn
            .query_row(
                "SELECT user_id, lesson_id, percent, status, updated_at
                 FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
                params![user_id, lesson_id],
                progress_from_row,
            )
            .optional()?;
        Ok(progress)
    }

    /// Percent per lesson for every lesson of the path the user has touched
    pub fn percent_by_lesson(&self, user_id: &str, path_id: &str) -> Result<HashMap<String, u8>> {
        let mut stmt = self.conn.prepare(
            "SELECT lp.lesson_id, lp.percent FROM lesson_progress lp
             JOIN lessons l ON l.id = lp.lesson_id
             JOIN skills s ON s.id = l.skill_id
             WHERE lp.user_id = ?1 AND s.path_id = ?2",
        )?;
        let rows = stmt.query_map(params![user_id, path_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u8>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
    }
}

// Write helpers take a bare connection so the catalog importer can run them
// inside a transaction.

pub(crate) fn upsert_path(conn: &Connection, path: &Path) -> Result<()> {
    conn.execute(
        "INSERT INTO paths (id, slug, title, summary) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            slug = excluded.slug, title = excluded.title, summary = excluded.summary",
        params![path.id, path.slug, path.title, path.summary],
    )?;
    Ok(())
}

pub(crate) fn upsert_skill(conn: &Connection, skill: &Skill) -> Result<()> {
    conn.execute(
        "INSERT INTO skills (id, path_id, name, summary) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            path_id = excluded.path_id, name = excluded.name, summary = excluded.summary",
        params![skill.id, skill.path_id, skill.name, skill.summary],
    )?;
    Ok(())
}

pub(crate) fn upsert_edge(conn: &Connection, edge: &SkillEdge) -> Result<()> {
    conn.execute(
        "INSERT INTO skill_edges (id, from_id, to_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET from_id = excluded.from_id, to_id = excluded.to_id",
        params![edge.id, edge.from_id, edge.to_id],
    )?;
    Ok(())
}

pub(crate) fn upsert_lesson(conn: &Connection, lesson: &Lesson) -> Result<()> {
    conn.execute(
        "INSERT INTO lessons (id, skill_id, path_id, title, content_md, position, quiz, resources, tasks)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            skill_id = excluded.skill_id,
            path_id = excluded.path_id,
            title = excluded.title,
            content_md = excluded.content_md,
            position = excluded.position,
            quiz = excluded.quiz,
            resources = excluded.resources,
            tasks = excluded.tasks",
        params![
            lesson.id,
            lesson.skill_id,
            lesson.path_id,
            lesson.title,
            lesson.content_md,
            lesson.order,
            to_json(&lesson.quiz)?,
            to_json(&lesson.resources)?,
            to_json(&lesson.tasks)?,
        ],
    )?;
    Ok(())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Read a JSON-encoded TEXT column
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a TEXT column that holds a value parsed with `FromStr`
pub(crate) fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn path_from_row(row: &Row<'_>) -> rusqlite::Result<Path> {
    Ok(Path {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
    })
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        skill_id: row.get(1)?,
        path_id: row.get(2)?,
        title: row.get(3)?,
        content_md: row.get(4)?,
        order: row.get(5)?,
        quiz: json_column(row, 6)?,
        resources: json_column(row, 7)?,
        tasks: json_column(row, 8)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<LessonProgress> {
    Ok(LessonProgress {
        user_id: row.get(0)?,
        lesson_id: row.get(1)?,
        percent: row.get(2)?,
        status: parsed_column(row, 3)?,
        updated_at: row.get::<_, DateTime<Utc>>(4)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Small two-skill path used across storage tests
    pub(crate) fn seed_sample(db: &Database) {
        db.upsert_path(&Path {
            id: "backend-api".to_string(),
            slug: "backend-api".to_string(),
            title: "Backend API Development".to_string(),
            summary: None,
        })
        .unwrap();
        for (id, name) in [("nodejs", "Node.js"), ("express", "Express")] {
            db.upsert_skill(&Skill {
                id: id.to_string(),
                path_id: "backend-api".to_string(),
                name: name.to_string(),
                summary: None,
            })
            .unwrap();
        }
        db.upsert_edge(&SkillEdge {
            id: "node-to-express".to_string(),
            from_id: "nodejs".to_string(),
            to_id: "express".to_string(),
        })
        .unwrap();
        for (id, skill, order) in [("node-intro", "nodejs", 1), ("express-intro", "express", 1)] {
            db.upsert_lesson(&Lesson {
                id: id.to_string(),
                skill_id: skill.to_string(),
                path_id: "backend-api".to_string(),
                title: id.to_string(),
                content_md: "# Title".to_string(),
                order,
                quiz: Vec::new(),
                resources: Vec::new(),
                tasks: vec!["Read it".to_string()],
            })
            .unwrap();
        }
    }

    #[test]
    fn test_open_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("study.db");
        let db = Database::open(&path).unwrap();
        seed_sample(&db);
        drop(db);

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.list_paths().unwrap().len(), 1);
    }

    #[test]
    fn test_list_paths_counts() {
        let db = Database::open_in_memory().unwrap();
        seed_sample(&db);

        let paths = db.list_paths().unwrap();
        assert_eq!(paths[0].skill_count, 2);
        assert_eq!(paths[0].lesson_count, 2);
        assert_eq!(paths[0].path.slug, "backend-api");
    }

    #[test]
    fn test_lesson_round_trips_json_columns() {
        let db = Database::open_in_memory().unwrap();
        seed_sample(&db);

        let lesson = db.get_lesson("node-intro").unwrap().unwrap();
        assert_eq!(lesson.tasks, vec!["Read it".to_string()]);
        assert!(db.get_lesson("missing").unwrap().is_none());
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let first = db.ensure_user("abc").unwrap();
        let second = db.ensure_user("abc").unwrap();

        assert_eq!(first.email, "guest_abc@example.invalid");
        assert_eq!(first.name, "Guest");
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_upsert_progress_overwrites() {
        let db = Database::open_in_memory().unwrap();
        seed_sample(&db);
        db.ensure_user("u1").unwrap();

        db.upsert_progress("u1", "node-intro", 40, ProgressStatus::InProgress)
            .unwrap();
        db.upsert_progress("u1", "node-intro", 100, ProgressStatus::Done)
            .unwrap();

        let progress = db.get_progress("u1", "node-intro").unwrap().unwrap();
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.status, ProgressStatus::Done);

        let by_lesson = db.percent_by_lesson("u1", "backend-api").unwrap();
        assert_eq!(by_lesson.len(), 1);
        assert_eq!(by_lesson["node-intro"], 100);
    }

    #[test]
    fn test_progress_requires_existing_lesson() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user("u1").unwrap();

        let result = db.upsert_progress("u1", "nope", 10, ProgressStatus::InProgress);
        assert!(result.is_err());
    }
}
