mod database;
mod models;

pub use database::{Database, StorageError};
pub(crate) use database::{json_column, parsed_column, to_json, upsert_edge, upsert_lesson, upsert_path, upsert_skill};
pub use models::*;

#[cfg(test)]
pub(crate) use database::tests::seed_sample;
