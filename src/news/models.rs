use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed to pull headlines from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("The Verge", "https://www.theverge.com/rss/index.xml"),
        FeedSource::new("Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
        FeedSource::new("Wired", "https://www.wired.com/feed/rss"),
        FeedSource::new("TechCrunch", "https://techcrunch.com/feed/"),
        FeedSource::new("DEV Community", "https://dev.to/feed"),
    ]
}

/// One headline as served by the news endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Merged headlines. `count` is the number of unique items before the
/// list was cut down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsDigest {
    pub items: Vec<NewsItem>,
    pub count: usize,
}
