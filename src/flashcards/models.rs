//! Data models for the flashcard system

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A flashcard with question (front) and answer (back)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Skill the card drills, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl Flashcard {
    pub fn new(id: String, front: String, back: String) -> Self {
        Self {
            id,
            front,
            back,
            tags: Vec::new(),
            skill_id: None,
            position: 0,
            created_at: Utc::now(),
        }
    }
}

/// Status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Never reviewed
    #[default]
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "review" => Ok(Self::Review),
            "relearning" => Ok(Self::Relearning),
            other => Err(format!("unknown card status {other}")),
        }
    }
}

/// Current spaced repetition state of one card for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    pub card_id: String,
    /// SM-2 ease factor (default 2.5)
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    /// Current interval in days
    #[serde(default)]
    pub interval: i64,
    /// Consecutive successful reviews
    #[serde(default)]
    pub repetitions: u32,
    /// When the card is due for review
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub status: CardStatus,
}

fn default_ease_factor() -> f64 {
    2.5
}

impl CardState {
    /// A card that has never been reviewed is due immediately
    pub fn new(card_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            card_id: card_id.into(),
            ease_factor: default_ease_factor(),
            interval: 0,
            repetitions: 0,
            due_date: now,
            review_count: 0,
            correct_count: 0,
            status: CardStatus::New,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_date
    }
}

/// A record of a single review attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: Uuid,
    pub user_id: String,
    pub card_id: String,
    /// Grade on the SM-2 scale (0-5)
    pub grade: u8,
    /// Interval granted by this review (days)
    pub interval: i64,
    /// Ease factor after this review
    pub ease_factor: f64,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn new(
        user_id: &str,
        state: &CardState,
        grade: u8,
        reviewed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            card_id: state.card_id.clone(),
            grade,
            interval: state.interval,
            ease_factor: state.ease_factor,
            reviewed_at,
        }
    }
}

/// Review statistics for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub due_cards: usize,
    pub reviews_today: usize,
    pub correct_today: usize,
    pub streak_days: u32,
}

/// A card with its current state, used for review sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardWithState {
    pub card: Flashcard,
    pub state: CardState,
}
