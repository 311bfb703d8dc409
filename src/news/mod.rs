//! Tech news aggregation from RSS and Atom feeds

pub mod aggregator;
pub mod models;
pub mod parser;
mod text;

pub use aggregator::{merge_items, FeedFetcher, HttpFetcher, NewsAggregator};
pub use models::*;
pub use parser::{parse_feed, FeedEntry};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Document is not an RSS or Atom feed")]
    NotAFeed,
}

pub type Result<T> = std::result::Result<T, NewsError>;
