use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use codestudy_lib::flashcards::algorithm::format_interval;
use codestudy_lib::flashcards::FlashcardStorage;

use crate::app::App;
use crate::render::{paint, print_json, Color};
use crate::OutputFormat;

pub fn run(app: &App, user: &str, limit: usize, format: &OutputFormat, use_color: bool) -> Result<()> {
    let db = app.open_database()?;
    let storage = FlashcardStorage::new(db.connection());
    let now = Utc::now();

    let due = storage
        .due_cards(user, now, limit)
        .context("Failed to load due cards")?;
    let stats = storage
        .review_stats(user, now)
        .context("Failed to compute review stats")?;

    match format {
        OutputFormat::Json => print_json(&json!({ "cards": due, "stats": stats }))?,
        OutputFormat::Plain => {
            println!(
                "{} due, {} new, {} learning, {} in review, streak {} days",
                paint(&stats.due_cards.to_string(), Color::BOLD, use_color),
                stats.new_cards,
                stats.learning_cards,
                stats.review_cards,
                stats.streak_days
            );
            for item in &due {
                println!(
                    "\n{} {}",
                    paint(&format!("[{}]", item.state.status), Color::YELLOW, use_color),
                    paint(&item.card.front, Color::BOLD, use_color)
                );
                println!(
                    "    {}",
                    paint(
                        &format!(
                            "ease {:.2}, interval {}, reviewed {} times",
                            item.state.ease_factor,
                            format_interval(item.state.interval),
                            item.state.review_count
                        ),
                        Color::DIM,
                        use_color
                    )
                );
            }
        }
    }

    Ok(())
}
