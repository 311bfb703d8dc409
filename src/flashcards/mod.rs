//! Flashcards and spaced repetition
//!
//! This module provides:
//! - Flashcard definitions shared by every learner
//! - SM-2 spaced repetition scheduling
//! - Per-user review state and review history

pub mod algorithm;
pub mod models;
pub mod storage;

pub use algorithm::{Grade, InvalidGrade};
pub use models::*;
pub(crate) use storage::upsert_card;
pub use storage::{FlashcardStorage, FlashcardStorageError};
