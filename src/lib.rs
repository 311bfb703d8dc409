//! CodeStudy: learning paths, spaced-repetition flashcards, a code
//! playground and a tech news digest behind a small JSON API.

pub mod config;
pub mod flashcards;
pub mod markdown;
pub mod news;
pub mod paths;
pub mod playground;
pub mod server;
pub mod storage;
