use std::path::Path;

use anyhow::{Context, Result};

use codestudy_lib::config::Config;
use codestudy_lib::storage::Database;

/// Shared application state for CLI commands
pub struct App {
    pub config: Config,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;
        Ok(Self { config })
    }

    /// Open the configured database, creating it if needed
    pub fn open_database(&self) -> Result<Database> {
        let path = self
            .config
            .database_path()
            .context("Failed to resolve database path")?;
        Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
    }

    /// Runtime for commands that talk to the network
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime> {
        tokio::runtime::Runtime::new().context("Failed to start async runtime")
    }
}
