pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::CacheService;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::database::Database;
use crate::services::auth::Credentials;
use crate::services::ledger::{LedgerSettings, SeatLedger};
use crate::store::SqliteStore;

// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: Arc<SqliteStore>,
    pub ledger: SeatLedger,
    pub cache: CacheService,
    pub credentials: Credentials,
    pub config: Config,
}

impl AppState {
    /// Connects and migrates the database and opens the optional cache.
    pub async fn new(config: Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let db = Database::new(&config.database.url, config.database.pool_size).await?;
        db.run_migrations().await?;
        tracing::info!("Database ready at {}", config.database.url);

        let cache = match CacheService::connect(&config.redis).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("Redis unavailable, continuing without cache: {}", e);
                CacheService::disabled()
            }
        };

        Ok(Arc::new(Self::with_parts(db, cache, config)))
    }

    /// Wires the services over an already prepared database.
    pub fn with_parts(db: Database, cache: CacheService, config: Config) -> Self {
        let store = Arc::new(SqliteStore::new(&db));
        let ledger = SeatLedger::new(
            store.clone(),
            Arc::new(SystemClock),
            LedgerSettings::from(&config.ledger),
        );
        let credentials = Credentials::from_config(&config.jwt);

        Self {
            db,
            store,
            ledger,
            cache,
            credentials,
            config,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
