//! HTTP API.
//!
//! All routes live under `/api`. Handlers share one [`AppState`]; the
//! database sits behind a mutex that is never held across an `.await`.

mod error;
mod routes;
mod session;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::{Config, ConfigError};
use crate::news::{HttpFetcher, NewsAggregator, NewsError};
use crate::storage::{Database, StorageError};

pub use error::ApiError;
pub use session::{session_cookie, user_id_from_headers, Session};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("News client error: {0}")]
    News(#[from] NewsError),
}

/// Server state shared across requests
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<Config>,
    pub news: Arc<NewsAggregator>,
}

impl AppState {
    pub fn new(db: Database, config: Config, news: NewsAggregator) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
            news: Arc::new(news),
        }
    }

    /// Lock the database; a poisoned lock is reported as an internal error
    pub fn db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) if value != "*" => Some(value),
            _ => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/news", get(routes::news::latest))
        .route("/api/paths", get(routes::paths::list))
        .route("/api/paths/{slug}", get(routes::paths::detail))
        .route("/api/paths/{slug}/progress", get(routes::paths::progress))
        .route("/api/progress", post(routes::progress::update))
        .route("/api/lessons/{id}", get(routes::lessons::show))
        .route("/api/lessons/{id}/answers", post(routes::lessons::answer))
        .route("/api/quiz/cards", get(routes::quiz::cards))
        .route("/api/quiz/review", post(routes::quiz::review))
        .route("/api/quiz/stats", get(routes::quiz::stats))
        .route("/api/playground/web", post(routes::playground::web))
        .route("/api/playground/script", post(routes::playground::script))
        .layer(cors)
        .with_state(state)
}

/// Open the database, build the news client and serve until Ctrl-C or
/// SIGTERM.
pub async fn start_server(config: Config) -> Result<(), ServerError> {
    let db_path = config.database_path()?;
    log::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    let fetcher = HttpFetcher::new(config.news.timeout(), &config.news.user_agent)?;
    let news = NewsAggregator::new(
        Arc::new(fetcher),
        config.news.feeds.clone(),
        config.news.per_feed_limit,
        config.news.top,
    );

    let address = config.bind_address();
    let app = router(AppState::new(db, config, news));

    let listener = TcpListener::bind(&address).await?;
    log::info!("CodeStudy API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received");
}
