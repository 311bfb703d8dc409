use std::path::PathBuf;

use anyhow::{Context, Result};

use codestudy_lib::paths::{Catalog, ImportSummary};

use crate::app::App;
use crate::render::{paint, print_json, Color};
use crate::OutputFormat;

pub fn run(app: App, files: &[PathBuf], format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut db = app.open_database()?;

    // Validate everything before writing anything
    let catalogs = files
        .iter()
        .map(|file| {
            Catalog::load(file).with_context(|| format!("Failed to load catalog {}", file.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut summaries: Vec<ImportSummary> = Vec::with_capacity(catalogs.len());
    for (file, catalog) in files.iter().zip(&catalogs) {
        let summary = catalog
            .import(&mut db)
            .with_context(|| format!("Failed to import {}", file.display()))?;
        summaries.push(summary);
    }

    match format {
        OutputFormat::Json => print_json(&summaries)?,
        OutputFormat::Plain => {
            for (file, summary) in files.iter().zip(&summaries) {
                let name = summary.path.as_deref().unwrap_or("flashcards");
                println!(
                    "{} {}: {} skills, {} edges, {} lessons, {} flashcards, {} removed",
                    paint("imported", Color::GREEN, use_color),
                    paint(name, Color::BOLD, use_color),
                    summary.skills,
                    summary.edges,
                    summary.lessons,
                    summary.flashcards,
                    summary.removed
                );
                println!("  {}", paint(&file.display().to_string(), Color::DIM, use_color));
            }
        }
    }

    Ok(())
}
