use std::sync::Arc;

use anyhow::{Context, Result};

use codestudy_lib::news::{HttpFetcher, NewsAggregator};

use crate::app::App;
use crate::render::{paint, print_json, Color};
use crate::OutputFormat;

pub fn run(app: &App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let settings = &app.config.news;
    let fetcher = HttpFetcher::new(settings.timeout(), &settings.user_agent)
        .context("Failed to create HTTP client")?;
    let aggregator = NewsAggregator::new(
        Arc::new(fetcher),
        settings.feeds.clone(),
        settings.per_feed_limit,
        limit.unwrap_or(settings.top),
    );

    let digest = app.runtime()?.block_on(aggregator.latest());

    match format {
        OutputFormat::Json => print_json(&digest)?,
        OutputFormat::Plain => {
            for item in &digest.items {
                let date = item
                    .published_at
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "undated".to_string());
                println!(
                    "{} {} {}",
                    paint(&date, Color::DIM, use_color),
                    paint(&format!("[{}]", item.source), Color::CYAN, use_color),
                    paint(&item.title, Color::BOLD, use_color)
                );
                println!("    {}", item.url);
            }
            println!("\n{} of {} headlines", digest.items.len(), digest.count);
        }
    }

    Ok(())
}
