use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod codec;
mod config;
mod db;
mod handlers;
mod models;
mod occ;
mod shortener;
mod store;

use cache::UrlCache;
use config::StoreBackend;
use shortener::Shortener;
use store::{DocumentStore, MemoryStore};

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub config: config::AppConfig,
    pub shortener: Shortener,
    /// id → url for every entry seen so far. Entries are immutable, so this
    /// never needs invalidating.
    pub cache: UrlCache,
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::api::index))
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .route("/shrink", post(handlers::api::shrink))
        .route("/explode", get(handlers::api::explode))
        .route("/stats", get(handlers::api::stats))
        // Short-id redirect; the fixed routes above take priority
        .route("/:id", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent; env vars may already be set)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortener=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting shortener on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            let pool = db::connect(&config.database_url).await?;
            Arc::new(db::SqliteStore::new(pool, config.document_key.clone()))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; urls will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let shortener = Shortener::new(store, config.max_conflict_retries);

    let cache = UrlCache::new();
    cache.warm(&shortener.document().await?);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        shortener,
        cache,
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;

    Ok(())
}
