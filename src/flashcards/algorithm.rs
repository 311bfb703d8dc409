//! SM-2 Spaced Repetition Algorithm
//!
//! Implementation of the SuperMemo 2 algorithm for calculating
//! review intervals based on recall quality.
//!
//! Grades (0-5):
//! - 0: Again, complete blackout
//! - 1: Hard, incorrect but recognised once shown
//! - 2: Good, incorrect but the answer seemed easy
//! - 3: Easy, correct with serious difficulty
//! - 4: Perfect, correct after hesitation
//! - 5: Mastered, instant recall

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{CardState, CardStatus};

/// Minimum ease factor allowed
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Lowest grade that counts as a successful recall
pub const PASSING_GRADE: u8 = 3;

/// Longest interval a review can grant (about 100 years)
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("grade must be between 0 and 5, got {0}")]
pub struct InvalidGrade(pub i64);

/// A recall grade on the SM-2 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const ALL: [Grade; 6] = [Grade(0), Grade(1), Grade(2), Grade(3), Grade(4), Grade(5)];

    pub fn new(value: i64) -> Result<Self, InvalidGrade> {
        if (0..=5).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(InvalidGrade(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_pass(self) -> bool {
        self.0 >= PASSING_GRADE
    }

    /// Button label shown for this grade
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Again",
            1 => "Hard",
            2 => "Good",
            3 => "Easy",
            4 => "Perfect",
            _ => "Mastered",
        }
    }
}

impl TryFrom<i64> for Grade {
    type Error = InvalidGrade;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

/// Scheduling values produced by one SM-2 step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2 {
    pub ease_factor: f64,
    pub interval: i64,
    pub repetitions: u32,
}

/// One SM-2 step.
///
/// A pass grows the interval (1 day, then 6, then `interval * ease_factor`
/// using the ease factor from before this review, capped at
/// [`MAX_INTERVAL_DAYS`]) and counts a repetition. A failure resets
/// repetitions and schedules the card for tomorrow. The ease factor is
/// adjusted for every grade and never drops below 1.3.
pub fn sm2(ease_factor: f64, interval: i64, repetitions: u32, grade: Grade) -> Sm2 {
    let q = grade.value() as f64;

    let (interval, repetitions) = if grade.is_pass() {
        let next = match repetitions {
            0 => 1,
            1 => 6,
            _ => ((interval as f64 * ease_factor).round() as i64).clamp(1, MAX_INTERVAL_DAYS),
        };
        (next, repetitions + 1)
    } else {
        (1, 0)
    };

    // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
    let ease_factor =
        (ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);

    Sm2 {
        ease_factor,
        interval,
        repetitions,
    }
}

/// `now` plus `interval` days. Out-of-range intervals are clamped and the
/// result saturates at the latest representable date.
pub fn next_review_date(now: DateTime<Utc>, interval: i64) -> DateTime<Utc> {
    now.checked_add_signed(Duration::days(interval.clamp(0, MAX_INTERVAL_DAYS)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Result of calculating the next review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResult {
    pub interval: i64,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub due_date: DateTime<Utc>,
    pub status: CardStatus,
}

/// Apply a grade to a card state
pub fn calculate_next_review(state: &CardState, grade: Grade, now: DateTime<Utc>) -> ReviewResult {
    let step = sm2(state.ease_factor, state.interval, state.repetitions, grade);

    let status = if grade.is_pass() {
        if step.repetitions >= 2 {
            CardStatus::Review
        } else {
            CardStatus::Learning
        }
    } else {
        match state.status {
            CardStatus::Review | CardStatus::Relearning => CardStatus::Relearning,
            CardStatus::New | CardStatus::Learning => CardStatus::Learning,
        }
    };

    ReviewResult {
        interval: step.interval,
        ease_factor: step.ease_factor,
        repetitions: step.repetitions,
        due_date: next_review_date(now, step.interval),
        status,
    }
}

/// Interval each grade would give, so the grade buttons can show it
pub fn preview_intervals(state: &CardState) -> Vec<(Grade, i64)> {
    Grade::ALL
        .iter()
        .map(|&grade| {
            let step = sm2(state.ease_factor, state.interval, state.repetitions, grade);
            (grade, step.interval)
        })
        .collect()
}

/// Ids of the cards whose due date has passed, in input order
pub fn due_cards<'a>(
    states: impl IntoIterator<Item = &'a CardState>,
    now: DateTime<Utc>,
) -> Vec<&'a str> {
    states
        .into_iter()
        .filter(|state| state.is_due(now))
        .map(|state| state.card_id.as_str())
        .collect()
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: i64) -> String {
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(value: i64) -> Grade {
        Grade::new(value).unwrap()
    }

    #[test]
    fn test_first_two_passes() {
        let first = sm2(2.5, 0, 0, grade(5));
        assert_eq!(first.repetitions, 1);
        assert_eq!(first.interval, 1);
        assert!((first.ease_factor - 2.6).abs() < 1e-9);

        let second = sm2(first.ease_factor, first.interval, first.repetitions, grade(5));
        assert_eq!(second.repetitions, 2);
        assert_eq!(second.interval, 6);
    }

    #[test]
    fn test_third_pass_uses_previous_ease() {
        let step = sm2(2.5, 6, 2, grade(4));
        // 6 * 2.5 = 15, ease unchanged at grade 4
        assert_eq!(step.interval, 15);
        assert_eq!(step.repetitions, 3);
        assert!((step.ease_factor - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_failure_resets() {
        let step = sm2(2.5, 30, 5, grade(2));
        assert_eq!(step.repetitions, 0);
        assert_eq!(step.interval, 1);
        assert!((step.ease_factor - 2.18).abs() < 1e-9);
    }

    #[test]
    fn test_ease_factor_floor() {
        let mut ef = 1.4;
        for _ in 0..5 {
            ef = sm2(ef, 1, 0, grade(0)).ease_factor;
            assert!(ef >= MIN_EASE_FACTOR);
        }
        assert_eq!(ef, MIN_EASE_FACTOR);
    }

    #[test]
    fn test_interval_is_capped() {
        let mut ef = 2.5;
        let mut interval = 0;
        let mut reps = 0;
        for _ in 0..60 {
            let step = sm2(ef, interval, reps, grade(5));
            assert!(step.interval <= MAX_INTERVAL_DAYS);
            ef = step.ease_factor;
            interval = step.interval;
            reps = step.repetitions;
        }
        assert_eq!(interval, MAX_INTERVAL_DAYS);

        let now = Utc::now();
        let mut state = CardState::new("c1", now);
        state.interval = interval;
        state.repetitions = reps;
        state.ease_factor = ef;
        let result = calculate_next_review(&state, grade(5), now);
        assert_eq!(result.due_date, now + Duration::days(MAX_INTERVAL_DAYS));
    }

    #[test]
    fn test_next_review_date_never_overflows() {
        let latest = DateTime::<Utc>::MAX_UTC;
        assert_eq!(next_review_date(latest, 1), latest);
        assert_eq!(next_review_date(latest - Duration::days(1), i64::MAX), latest);

        let now = Utc::now();
        assert_eq!(next_review_date(now, 6), now + Duration::days(6));
    }

    #[test]
    fn test_grade_bounds() {
        assert_eq!(Grade::new(6), Err(InvalidGrade(6)));
        assert_eq!(Grade::new(-1), Err(InvalidGrade(-1)));
        assert_eq!(grade(0).label(), "Again");
        assert_eq!(grade(5).label(), "Mastered");
        assert!(serde_json::from_str::<Grade>("7").is_err());
        assert_eq!(serde_json::from_str::<Grade>("3").unwrap(), grade(3));
    }

    #[test]
    fn test_status_transitions() {
        let now = Utc::now();
        let mut state = CardState::new("c1", now);

        let first = calculate_next_review(&state, grade(4), now);
        assert_eq!(first.status, CardStatus::Learning);
        assert_eq!(first.due_date, now + Duration::days(1));

        state.repetitions = first.repetitions;
        state.interval = first.interval;
        state.status = first.status;
        let second = calculate_next_review(&state, grade(4), now);
        assert_eq!(second.status, CardStatus::Review);

        state.repetitions = second.repetitions;
        state.interval = second.interval;
        state.status = second.status;
        let lapse = calculate_next_review(&state, grade(1), now);
        assert_eq!(lapse.status, CardStatus::Relearning);
        assert_eq!(lapse.interval, 1);
    }

    #[test]
    fn test_preview_intervals() {
        let mut state = CardState::new("c1", Utc::now());
        state.repetitions = 2;
        state.interval = 6;

        let preview = preview_intervals(&state);
        assert_eq!(preview.len(), 6);
        assert_eq!(preview[0], (grade(0), 1));
        assert_eq!(preview[5], (grade(5), 15));
    }

    #[test]
    fn test_due_cards() {
        let now = Utc::now();
        let due = CardState::new("due", now - Duration::hours(1));
        let mut later = CardState::new("later", now);
        later.due_date = now + Duration::days(3);

        assert_eq!(due_cards([&due, &later], now), vec!["due"]);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(5), "5d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
        assert_eq!(format_interval(730), "2y");
    }
}
