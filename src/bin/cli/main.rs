mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "codestudy", about = "CodeStudy learning server and CLI", version)]
struct Cli {
    /// Config file (default: $CODESTUDY_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Load catalog files (paths, lessons, flashcards) into the database
    Import {
        /// TOML catalog files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List learning paths
    Paths,

    /// Show the skills of a path in prerequisite order
    Order {
        /// Path slug
        slug: String,
        /// Show this user's progress and the next skills to study
        #[arg(long)]
        user: Option<String>,
    },

    /// Fetch the latest tech headlines
    News {
        /// Maximum headlines to print
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show flashcards due for a user
    Cards {
        /// User id (the value of the uid cookie)
        #[arg(long)]
        user: String,
        /// Maximum cards
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Command::Serve => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => commands::serve::run(app)?,
        Command::Import { files } => {
            commands::import::run(app, &files, &cli.format, use_color)?;
        }
        Command::Paths => commands::paths::run_list(&app, &cli.format, use_color)?,
        Command::Order { slug, user } => {
            commands::paths::run_order(&app, &slug, user.as_deref(), &cli.format, use_color)?;
        }
        Command::News { limit } => commands::news::run(&app, limit, &cli.format, use_color)?,
        Command::Cards { user, limit } => {
            commands::cards::run(&app, &user, limit, &cli.format, use_color)?;
        }
    }

    Ok(())
}
