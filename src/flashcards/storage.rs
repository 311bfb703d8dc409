//! Storage operations for flashcards
//!
//! Cards are shared by everyone; scheduling state is kept per user in
//! `card_states`, and every graded review is appended to `review_log`.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use super::algorithm::{calculate_next_review, Grade, ReviewResult};
use super::models::*;
use crate::storage::{json_column, parsed_column, to_json, StorageError};

#[derive(Error, Debug)]
pub enum FlashcardStorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Card not found: {0}")]
    CardNotFound(String),
}

pub type Result<T> = std::result::Result<T, FlashcardStorageError>;

/// Insert or refresh a card definition. Existing review state is kept.
pub(crate) fn upsert_card(conn: &Connection, card: &Flashcard) -> std::result::Result<(), StorageError> {
    conn.execute(
        "INSERT INTO flashcards (id, front, back, tags, skill_id, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            front = excluded.front,
            back = excluded.back,
            tags = excluded.tags,
            skill_id = excluded.skill_id,
            position = excluded.position",
        params![
            card.id,
            card.front,
            card.back,
            to_json(&card.tags)?,
            card.skill_id,
            card.position,
            card.created_at,
        ],
    )?;
    Ok(())
}

const CARD_COLUMNS: &str = "f.id, f.front, f.back, f.tags, f.skill_id, f.position, f.created_at";

const STATE_COLUMNS: &str = "s.card_id, s.ease_factor, s.interval, s.repetitions, s.due_date, \
                             s.review_count, s.correct_count, s.status";

/// Storage manager for flashcard operations
pub struct FlashcardStorage<'a> {
    conn: &'a Connection,
}

impl<'a> FlashcardStorage<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ==================== Card Operations ====================

    pub fn list_cards(&self) -> Result<Vec<Flashcard>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards f ORDER BY f.position, f.rowid"
        ))?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    pub fn get_card(&self, card_id: &str) -> Result<Flashcard> {
        self.conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM flashcards f WHERE f.id = ?1"),
                [card_id],
                card_from_row,
            )
            .optional()?
            .ok_or_else(|| FlashcardStorageError::CardNotFound(card_id.to_string()))
    }

    pub fn upsert_card(&self, card: &Flashcard) -> Result<()> {
        upsert_card(self.conn, card)?;
        Ok(())
    }

    // ==================== State Operations ====================

    /// The user's state for a card; a card never reviewed gets a fresh state
    pub fn get_state(&self, user_id: &str, card_id: &str, now: DateTime<Utc>) -> Result<CardState> {
        let state = self
            .conn
            .query_row(
                &format!("SELECT {STATE_COLUMNS} FROM card_states s WHERE s.user_id = ?1 AND s.card_id = ?2"),
                params![user_id, card_id],
                |row| state_from_row(row, 0),
            )
            .optional()?;
        Ok(state.unwrap_or_else(|| CardState::new(card_id, now)))
    }

    fn save_state(conn: &Connection, user_id: &str, state: &CardState) -> Result<()> {
        conn.execute(
            "INSERT INTO card_states
                (user_id, card_id, ease_factor, interval, repetitions, due_date,
                 review_count, correct_count, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id, card_id) DO UPDATE SET
                ease_factor = excluded.ease_factor,
                interval = excluded.interval,
                repetitions = excluded.repetitions,
                due_date = excluded.due_date,
                review_count = excluded.review_count,
                correct_count = excluded.correct_count,
                status = excluded.status",
            params![
                user_id,
                state.card_id,
                state.ease_factor,
                state.interval,
                state.repetitions,
                state.due_date,
                state.review_count,
                state.correct_count,
                state.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Every card with the user's state, in card order
    fn cards_with_state(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<CardWithState>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS}, {STATE_COLUMNS}
             FROM flashcards f
             LEFT JOIN card_states s ON s.card_id = f.id AND s.user_id = ?1
             ORDER BY f.position, f.rowid"
        ))?;
        let rows = stmt
            .query_map([user_id], |row| {
                let card = card_from_row(row)?;
                let has_state: Option<String> = row.get(7)?;
                let state = match has_state {
                    Some(_) => state_from_row(row, 7)?,
                    None => CardState::new(card.id.clone(), now),
                };
                Ok(CardWithState { card, state })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ==================== Review Operations ====================

    /// Cards due for the user, oldest due date first. Cards the user has
    /// never reviewed are due.
    pub fn due_cards(&self, user_id: &str, now: DateTime<Utc>, limit: usize) -> Result<Vec<CardWithState>> {
        let mut due: Vec<CardWithState> = self
            .cards_with_state(user_id, now)?
            .into_iter()
            .filter(|c| c.state.is_due(now))
            .collect();

        // Stable, so equal due dates keep card order
        due.sort_by(|a, b| a.state.due_date.cmp(&b.state.due_date));
        due.truncate(limit);
        Ok(due)
    }

    /// Grade a card for a user. The user row must already exist.
    pub fn submit_review(
        &self,
        user_id: &str,
        card_id: &str,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<CardState> {
        // Reject unknown cards before touching state
        self.get_card(card_id)?;

        let mut state = self.get_state(user_id, card_id, now)?;

        let ReviewResult {
            interval,
            ease_factor,
            repetitions,
            due_date,
            status,
        } = calculate_next_review(&state, grade, now);

        state.interval = interval;
        state.ease_factor = ease_factor;
        state.repetitions = repetitions;
        state.due_date = due_date;
        state.status = status;
        state.review_count += 1;
        if grade.is_pass() {
            state.correct_count += 1;
        }

        // State and log entry land together or not at all
        let tx = self.conn.unchecked_transaction()?;
        Self::save_state(&tx, user_id, &state)?;

        let record = ReviewRecord::new(user_id, &state, grade.value(), now);
        tx.execute(
            "INSERT INTO review_log (id, user_id, card_id, grade, interval, ease_factor, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.user_id,
                record.card_id,
                record.grade,
                record.interval,
                record.ease_factor,
                record.reviewed_at,
            ],
        )?;
        tx.commit()?;

        log::debug!(
            "User {} graded {} as {}, next review in {} days",
            user_id,
            card_id,
            grade,
            interval
        );

        Ok(state)
    }

    pub fn review_history(&self, user_id: &str) -> Result<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, card_id, grade, interval, ease_factor, reviewed_at
             FROM review_log WHERE user_id = ?1 ORDER BY reviewed_at",
        )?;
        let records = stmt
            .query_map([user_id], |row| {
                let id: String = row.get(0)?;
                Ok(ReviewRecord {
                    id: id.parse().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    user_id: row.get(1)?,
                    card_id: row.get(2)?,
                    grade: row.get(3)?,
                    interval: row.get(4)?,
                    ease_factor: row.get(5)?,
                    reviewed_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Review statistics for a user. Days are UTC calendar days.
    pub fn review_stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<ReviewStats> {
        let cards = self.cards_with_state(user_id, now)?;

        let mut stats = ReviewStats {
            total_cards: cards.len(),
            ..ReviewStats::default()
        };

        for CardWithState { state, .. } in &cards {
            match state.status {
                CardStatus::New => stats.new_cards += 1,
                CardStatus::Learning => stats.learning_cards += 1,
                CardStatus::Review | CardStatus::Relearning => stats.review_cards += 1,
            }
            if state.is_due(now) {
                stats.due_cards += 1;
            }
        }

        let today = now.date_naive();
        let history = self.review_history(user_id)?;
        let mut review_days: HashSet<NaiveDate> = HashSet::new();
        for record in &history {
            let day = record.reviewed_at.date_naive();
            review_days.insert(day);
            if day == today {
                stats.reviews_today += 1;
                if Grade::new(record.grade as i64).map_or(false, Grade::is_pass) {
                    stats.correct_today += 1;
                }
            }
        }
        stats.streak_days = streak_days(&review_days, today);

        Ok(stats)
    }
}

/// Consecutive days with at least one review, ending today (or yesterday,
/// when nothing has been reviewed yet today)
fn streak_days(review_days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if review_days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while review_days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        front: row.get(1)?,
        back: row.get(2)?,
        tags: json_column(row, 3)?,
        skill_id: row.get(4)?,
        position: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn state_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CardState> {
    Ok(CardState {
        card_id: row.get(offset)?,
        ease_factor: row.get(offset + 1)?,
        interval: row.get(offset + 2)?,
        repetitions: row.get(offset + 3)?,
        due_date: row.get(offset + 4)?,
        review_count: row.get(offset + 5)?,
        correct_count: row.get(offset + 6)?,
        status: parsed_column(row, offset + 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (i, id) in ["useState", "let-const", "doctype"].iter().enumerate() {
            let mut card = Flashcard::new(id.to_string(), format!("Q {id}"), format!("A {id}"));
            card.position = i as i32;
            card.tags = vec!["web".to_string()];
            upsert_card(db.connection(), &card).unwrap();
        }
        db.ensure_user("u1").unwrap();
        db
    }

    fn grade(value: i64) -> Grade {
        Grade::new(value).unwrap()
    }

    #[test]
    fn test_list_and_get_cards() {
        let db = setup();
        let storage = FlashcardStorage::new(db.connection());

        let cards = storage.list_cards().unwrap();
        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["useState", "let-const", "doctype"]);
        assert_eq!(cards[0].tags, vec!["web".to_string()]);

        assert!(matches!(
            storage.get_card("missing"),
            Err(FlashcardStorageError::CardNotFound(_))
        ));
    }

    #[test]
    fn test_new_cards_are_due() {
        let db = setup();
        let storage = FlashcardStorage::new(db.connection());
        let now = Utc::now();

        let due = storage.due_cards("u1", now, 10).unwrap();
        assert_eq!(due.len(), 3);
        assert_eq!(due[0].state.status, CardStatus::New);

        assert_eq!(storage.due_cards("u1", now, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_submit_review_schedules_card() {
        let db = setup();
        let storage = FlashcardStorage::new(db.connection());
        let now = Utc::now();

        let state = storage.submit_review("u1", "useState", grade(5), now).unwrap();
        assert_eq!(state.repetitions, 1);
        assert_eq!(state.interval, 1);
        assert_eq!(state.review_count, 1);
        assert_eq!(state.correct_count, 1);
        assert_eq!(state.status, CardStatus::Learning);

        let due = storage.due_cards("u1", now, 10).unwrap();
        assert!(due.iter().all(|c| c.card.id != "useState"));

        let tomorrow = now + Duration::days(1);
        let due = storage.due_cards("u1", tomorrow, 10).unwrap();
        assert!(due.iter().any(|c| c.card.id == "useState"));

        let state = storage.submit_review("u1", "useState", grade(5), tomorrow).unwrap();
        assert_eq!(state.repetitions, 2);
        assert_eq!(state.interval, 6);
        assert_eq!(state.status, CardStatus::Review);
    }

    #[test]
    fn test_state_is_per_user() {
        let db = setup();
        db.ensure_user("u2").unwrap();
        let storage = FlashcardStorage::new(db.connection());
        let now = Utc::now();

        storage.submit_review("u1", "doctype", grade(4), now).unwrap();

        let other = storage.get_state("u2", "doctype", now).unwrap();
        assert_eq!(other.review_count, 0);
        assert_eq!(other.status, CardStatus::New);
    }

    #[test]
    fn test_unknown_card_rejected() {
        let db = setup();
        let storage = FlashcardStorage::new(db.connection());
        assert!(matches!(
            storage.submit_review("u1", "nope", grade(3), Utc::now()),
            Err(FlashcardStorageError::CardNotFound(_))
        ));
    }

    #[test]
    fn test_failed_log_write_leaves_state_untouched() {
        let db = setup();
        db.connection()
            .execute_batch(
                "CREATE TRIGGER reject_log BEFORE INSERT ON review_log
                 BEGIN SELECT RAISE(ABORT, 'review log unavailable'); END;",
            )
            .unwrap();
        let storage = FlashcardStorage::new(db.connection());
        let now = Utc::now();

        assert!(storage.submit_review("u1", "useState", grade(5), now).is_err());

        let state = storage.get_state("u1", "useState", now).unwrap();
        assert_eq!(state.review_count, 0);
        assert_eq!(state.status, CardStatus::New);
        assert!(storage.review_history("u1").unwrap().is_empty());
    }

    #[test]
    fn test_reimport_keeps_state() {
        let db = setup();
        let storage = FlashcardStorage::new(db.connection());
        let now = Utc::now();
        storage.submit_review("u1", "let-const", grade(5), now).unwrap();

        let mut card = storage.get_card("let-const").unwrap();
        card.back = "Updated".to_string();
        storage.upsert_card(&card).unwrap();

        assert_eq!(storage.get_card("let-const").unwrap().back, "Updated");
        assert_eq!(storage.get_state("u1", "let-const", now).unwrap().review_count, 1);
    }

    #[test]
    fn test_review_stats() {
        let db = setup();
        let storage = FlashcardStorage::new(db.connection());
        let now = Utc::now();

        storage.submit_review("u1", "useState", grade(5), now).unwrap();
        storage.submit_review("u1", "let-const", grade(1), now).unwrap();

        let stats = storage.review_stats("u1", now).unwrap();
        assert_eq!(stats.total_cards, 3);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.learning_cards, 2);
        assert_eq!(stats.due_cards, 1);
        assert_eq!(stats.reviews_today, 2);
        assert_eq!(stats.correct_today, 1);
        assert_eq!(stats.streak_days, 1);

        assert_eq!(storage.review_history("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_streak_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let days: HashSet<NaiveDate> = [8, 9]
            .iter()
            .map(|d| NaiveDate::from_ymd_opt(2026, 3, *d).unwrap())
            .collect();
        assert_eq!(streak_days(&days, today), 2);

        let gap: HashSet<NaiveDate> = [7, 10]
            .iter()
            .map(|d| NaiveDate::from_ymd_opt(2026, 3, *d).unwrap())
            .collect();
        assert_eq!(streak_days(&gap, today), 1);
        assert_eq!(streak_days(&HashSet::new(), today), 0);
    }
}
