use std::collections::{HashMap, HashSet};

use anyhow::{bail, Context, Result};
use serde_json::json;

use codestudy_lib::paths::graph::{next_unlocked, ranks, topological_order, Edge, NodeId};
use codestudy_lib::paths::progress::{skill_progress, SkillStatus};

use crate::app::App;
use crate::render::{paint, print_json, progress_bar, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let db = app.open_database()?;
    let paths = db.list_paths().context("Failed to list paths")?;

    match format {
        OutputFormat::Json => print_json(&paths)?,
        OutputFormat::Plain => {
            if paths.is_empty() {
                println!("No paths yet. Load some with `codestudy import content/*.toml`.");
            }
            for summary in &paths {
                println!(
                    "{}  {} ({} skills, {} lessons)",
                    paint(&summary.path.slug, Color::CYAN, use_color),
                    summary.path.title,
                    summary.skill_count,
                    summary.lesson_count
                );
                if let Some(text) = &summary.path.summary {
                    println!("    {}", paint(text, Color::DIM, use_color));
                }
            }
        }
    }

    Ok(())
}

pub fn run_order(
    app: &App,
    slug: &str,
    user: Option<&str>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let db = app.open_database()?;
    let Some(path) = db.get_path_by_slug(slug)? else {
        bail!("No path with slug '{}'", slug);
    };

    let skills = db.skills_for_path(&path.id)?;
    let edges: Vec<Edge> = db.edges_for_path(&path.id)?.iter().map(Edge::from).collect();
    let lessons = db.lessons_for_path(&path.id)?;
    let percent_by_lesson = match user {
        Some(user) => db.percent_by_lesson(user, &path.id)?,
        None => HashMap::new(),
    };

    let ids: Vec<NodeId> = skills.iter().map(|s| s.id.clone()).collect();
    let order = topological_order(&ids, &edges)
        .with_context(|| format!("Prerequisites of '{}' are inconsistent", slug))?;
    let rank_of = ranks(&order, &edges);

    let progress: HashMap<String, _> = skill_progress(&skills, &lessons, &edges, &percent_by_lesson)
        .into_iter()
        .map(|p| (p.skill_id.clone(), p))
        .collect();
    let done: HashSet<NodeId> = progress
        .values()
        .filter(|p| p.status == SkillStatus::Done)
        .map(|p| p.skill_id.clone())
        .collect();
    let next = next_unlocked(&order, &edges, &done);

    match format {
        OutputFormat::Json => {
            let steps: Vec<_> = order
                .iter()
                .filter_map(|id| progress.get(id))
                .map(|p| {
                    json!({
                        "skillId": p.skill_id,
                        "name": p.name,
                        "rank": rank_of.get(&p.skill_id).copied().unwrap_or(0),
                        "percent": p.percent,
                        "status": p.status,
                    })
                })
                .collect();
            print_json(&json!({ "path": path.slug, "order": steps, "next": next }))?;
        }
        OutputFormat::Plain => {
            println!("{}", paint(&path.title, Color::BOLD, use_color));
            for (i, id) in order.iter().enumerate() {
                let Some(p) = progress.get(id) else { continue };
                let indent = "  ".repeat(rank_of.get(id).copied().unwrap_or(0));
                let status = match p.status {
                    SkillStatus::Done => paint("done", Color::GREEN, use_color),
                    SkillStatus::Available => paint("available", Color::YELLOW, use_color),
                    SkillStatus::Locked => paint("locked", Color::DIM, use_color),
                };
                if user.is_some() {
                    println!("{:>2}. {}{} {} {:>3}% {}", i + 1, indent, p.name, progress_bar(p.percent), p.percent, status);
                } else {
                    println!("{:>2}. {}{}", i + 1, indent, p.name);
                }
            }
            if user.is_some() && !next.is_empty() {
                let names: Vec<&str> = next
                    .iter()
                    .filter_map(|id| progress.get(id).map(|p| p.name.as_str()))
                    .collect();
                println!("\nNext up: {}", names.join(", "));
            }
        }
    }

    Ok(())
}
