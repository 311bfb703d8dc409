//! Runtime configuration.
//!
//! Settings come from an optional TOML file, then `CODESTUDY_*` environment
//! variables override individual values. Every field has a default, so an
//! empty file (or none at all) is a valid configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::news::{default_feeds, FeedSource};
use crate::storage::{Database, StorageError};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CODESTUDY_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid CORS origin {0:?}: use explicit origins")]
    InvalidOrigin(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub news: NewsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS; empty disables cross-origin access
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to the user's local data directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub per_feed_limit: usize,
    pub top: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub feeds: Vec<FeedSource>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            per_feed_limit: 10,
            top: 20,
            timeout_secs: 15,
            user_agent: format!("Mozilla/5.0 (compatible; CodeStudy/{})", env!("CARGO_PKG_VERSION")),
            feeds: default_feeds(),
        }
    }
}

impl NewsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_days: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "uid".to_string(),
            max_age_days: 365,
        }
    }
}

impl SessionConfig {
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_days as u64 * 24 * 60 * 60
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if let Some(origin) = self
            .server
            .allowed_origins
            .iter()
            .find(|origin| origin.trim() == "*")
        {
            return Err(ConfigError::InvalidOrigin(origin.clone()));
        }
        Ok(())
    }

    /// Load from `path`, or from `$CODESTUDY_CONFIG` when no path is given,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match file {
            Some(file) => {
                let text = fs::read_to_string(&file).map_err(|source| ConfigError::Io {
                    path: file.clone(),
                    source,
                })?;
                log::info!("Loading config from {}", file.display());
                Self::parse(&text)?
            }
            None => {
                log::info!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from `CODESTUDY_HOST`, `CODESTUDY_PORT` and
    /// `CODESTUDY_DB`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("CODESTUDY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CODESTUDY_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CODESTUDY_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(db) = lookup("CODESTUDY_DB") {
            self.database.path = Some(PathBuf::from(db));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Database::default_path()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.news.per_feed_limit, 10);
        assert_eq!(config.news.top, 20);
        assert_eq!(config.news.feeds.len(), 5);
        assert_eq!(config.news.feeds[0].name, "The Verge");
        assert_eq!(config.session.cookie_name, "uid");
        assert_eq!(config.session.max_age_secs(), 31_536_000);
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let config = Config::parse(include_str!("../codestudy.example.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
[server]
port = 8080

[news]
top = 5
feeds = [{ name = "Lobsters", url = "https://lobste.rs/rss" }]
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.news.top, 5);
        assert_eq!(config.news.per_feed_limit, 10);
        assert_eq!(config.news.feeds, vec![FeedSource::new("Lobsters", "https://lobste.rs/rss")]);
    }

    #[test]
    fn test_wildcard_origin_rejected() {
        let err = Config::parse("[server]\nallowed_origins = [\"https://study.example\", \"*\"]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin(ref o) if o == "*"));

        let ok = Config::parse("[server]\nallowed_origins = []\n").unwrap();
        assert!(ok.server.allowed_origins.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CODESTUDY_HOST", "0.0.0.0"),
            ("CODESTUDY_PORT", "9000"),
            ("CODESTUDY_DB", "/tmp/study.db"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/study.db"));
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == "CODESTUDY_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("codestudy.toml");
        fs::write(&file, "[session]\nmax_age_days = 30\n").unwrap();

        let config = Config::load(Some(&file)).unwrap();
        assert_eq!(config.session.max_age_days, 30);
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = Config::load(Some(&temp.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
