//! Concurrent fan-out over the configured feeds

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;

use super::models::{FeedSource, NewsDigest, NewsItem};
use super::parser::{parse_feed, FeedEntry};
use super::text::snippet;
use super::{NewsError, Result};

/// Fetches a feed document by URL
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

pub struct NewsAggregator {
    fetcher: Arc<dyn FeedFetcher>,
    feeds: Vec<FeedSource>,
    per_feed_limit: usize,
    top: usize,
}

impl NewsAggregator {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        feeds: Vec<FeedSource>,
        per_feed_limit: usize,
        top: usize,
    ) -> Self {
        Self {
            fetcher,
            feeds,
            per_feed_limit,
            top,
        }
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    /// Fetch and convert the first entries of one feed
    pub async fn fetch_feed(&self, source: &FeedSource) -> Result<Vec<NewsItem>> {
        let body = self.fetcher.fetch(&source.url).await?;
        let entries = parse_feed(&body)?;
        Ok(entries
            .iter()
            .take(self.per_feed_limit)
            .map(|entry| to_item(&source.name, entry))
            .collect())
    }

    /// Headlines from every feed, merged. A feed that fails is logged and
    /// left out.
    pub async fn latest(&self) -> NewsDigest {
        let results = join_all(self.feeds.iter().map(|source| self.fetch_feed(source))).await;

        let mut items = Vec::new();
        for (source, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(feed_items) => {
                    log::debug!("Fetched {} items from {}", feed_items.len(), source.name);
                    items.extend(feed_items);
                }
                Err(e) => log::warn!("Failed to fetch {}: {}", source.name, e),
            }
        }

        merge_items(items, self.top)
    }
}

fn to_item(source: &str, entry: &FeedEntry) -> NewsItem {
    NewsItem {
        source: source.to_string(),
        title: entry
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        url: entry
            .link
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "#".to_string()),
        published_at: entry.published,
        summary: entry.body().and_then(snippet),
    }
}

/// Sort newest first (undated last), drop repeated URLs keeping the first,
/// then keep the `top` newest. `count` reports every unique item.
pub fn merge_items(mut items: Vec<NewsItem>, top: usize) -> NewsDigest {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut seen = HashSet::new();
    let unique: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.url.clone()))
        .collect();

    let count = unique.len();
    NewsDigest {
        items: unique.into_iter().take(top).collect(),
        count,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    /// Serves canned documents; unknown URLs fail
    pub(crate) struct StubFetcher {
        pub documents: HashMap<String, String>,
    }

    #[async_trait]
    impl FeedFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| NewsError::Status {
                    url: url.to_string(),
                    status: 503,
                })
        }
    }

    pub(crate) fn rss(items: &[(&str, &str, u32)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link, day)| {
                let date = Utc.with_ymd_and_hms(2026, 3, *day, 12, 0, 0).unwrap();
                format!(
                    "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate>\
                     <description>&lt;p&gt;About {}&lt;/p&gt;</description></item>",
                    title,
                    link,
                    date.to_rfc2822(),
                    title
                )
            })
            .collect();
        format!("<rss version=\"2.0\"><channel><title>t</title>{}</channel></rss>", body)
    }

    fn item(url: &str, day: Option<u32>) -> NewsItem {
        NewsItem {
            source: "s".to_string(),
            title: url.to_string(),
            url: url.to_string(),
            published_at: day.map(|d| Utc.with_ymd_and_hms(2026, 3, d, 0, 0, 0).unwrap()),
            summary: None,
        }
    }

    #[test]
    fn test_merge_sorts_and_dedupes() {
        let digest = merge_items(
            vec![
                item("a", Some(1)),
                item("undated", None),
                item("b", Some(3)),
                item("a", Some(5)),
                item("c", Some(2)),
            ],
            3,
        );

        let urls: Vec<&str> = digest.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
        // Newest copy of "a" is the one kept
        assert_eq!(digest.items[0].published_at.map(|d| d.format("%d").to_string()), Some("05".to_string()));
        assert_eq!(digest.count, 4);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let entry = FeedEntry::default();
        let news = to_item("Wired", &entry);
        assert_eq!(news.title, "Untitled");
        assert_eq!(news.url, "#");
        assert_eq!(news.summary, None);
    }

    #[tokio::test]
    async fn test_latest_skips_failing_feed() {
        let mut documents = HashMap::new();
        documents.insert(
            "https://one.test/feed".to_string(),
            rss(&[("One", "https://one.test/1", 2), ("Shared", "https://shared.test/x", 4)]),
        );
        documents.insert(
            "https://two.test/feed".to_string(),
            rss(&[("Two", "https://two.test/1", 3), ("Shared again", "https://shared.test/x", 1)]),
        );

        let aggregator = NewsAggregator::new(
            Arc::new(StubFetcher { documents }),
            vec![
                FeedSource::new("One", "https://one.test/feed"),
                FeedSource::new("Down", "https://down.test/feed"),
                FeedSource::new("Two", "https://two.test/feed"),
            ],
            10,
            20,
        );

        let digest = aggregator.latest().await;
        let titles: Vec<&str> = digest.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Shared", "Two", "One"]);
        assert_eq!(digest.count, 3);
        assert_eq!(digest.items[0].source, "One");
        assert_eq!(digest.items[0].summary.as_deref(), Some("About Shared"));
    }

    #[tokio::test]
    async fn test_per_feed_limit() {
        let entries: Vec<(String, String, u32)> = (1..=12)
            .map(|d| (format!("Item {d}"), format!("https://x.test/{d}"), d))
            .collect();
        let refs: Vec<(&str, &str, u32)> = entries
            .iter()
            .map(|(t, l, d)| (t.as_str(), l.as_str(), *d))
            .collect();

        let mut documents = HashMap::new();
        documents.insert("https://x.test/feed".to_string(), rss(&refs));

        let aggregator = NewsAggregator::new(
            Arc::new(StubFetcher { documents }),
            vec![FeedSource::new("X", "https://x.test/feed")],
            10,
            20,
        );

        let digest = aggregator.latest().await;
        assert_eq!(digest.count, 10);
        assert_eq!(digest.items[0].title, "Item 10");
    }
}
