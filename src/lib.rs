pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod extractors;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub cache: Option<cache::CacheService>,
    pub config: config::Config,
}

impl AppState {
    /// Connects to Postgres, applies migrations, connects the cache when
    /// enabled and bootstraps the staff account if configured.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;
        info!("Database connected");

        db.run_migrations().await?;
        info!("Migrations applied");

        let cache = if config.features.enable_cache {
            match cache::CacheService::connect(
                &config.redis.url,
                config.features.performance_cache_ttl_seconds,
            )
            .await
            {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!("Redis unavailable, serving without cache: {:?}", e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(admin) = &config.admin {
            services::auth::ensure_admin(&db, admin).await?;
        }

        Ok(Arc::new(Self { db, cache, config }))
    }

    /// State over a pool that connects on first use; no cache, no migrations.
    pub fn lazy(config: config::Config) -> Result<Arc<Self>, sqlx::Error> {
        let db = database::Database::lazy(&config.database.url)?;
        Ok(Arc::new(Self { db, cache: None, config }))
    }

    pub async fn invalidate_performances(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_performances().await;
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Theatre booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!("Health check failed: {:?}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
