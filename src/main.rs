use anyhow::Result;
use axum::http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use beacon::config::{Config, DatabaseBackend};
use beacon::rewrite::TrackingLinks;
use beacon::storage::{CachedStorage, PostgresStorage, SqliteStorage, Storage};
use beacon::{api, track};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(PostgresStorage::new(&config.database.url).await?)
        }
    };

    // Initialize database
    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    // Optional banner read cache in front of the store
    let storage: Arc<dyn Storage> = if config.cache.enabled {
        info!(
            "Banner cache enabled ({} entries, {}s TTL)",
            config.cache.max_entries, config.cache.ttl_secs
        );
        Arc::new(CachedStorage::new(
            storage,
            config.cache.max_entries,
            config.cache.ttl_secs,
        ))
    } else {
        storage
    };

    let redirect_status = StatusCode::from_u16(config.tracking.redirect_status)
        .unwrap_or(StatusCode::FOUND);
    let links = TrackingLinks::new(&config.tracking.public_base_url);

    // Create routers
    let api_router = api::create_api_router(Arc::clone(&storage), links);
    let track_router = track::create_track_router(
        Arc::clone(&storage),
        config.tracking.fallback_redirect_url.clone(),
        redirect_status,
        Duration::from_millis(config.tracking.store_timeout_ms),
        config.tracking.trust_proxy_headers,
    );

    // Start dashboard API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - Analytics at http://{}/api/analytics/...", api_addr);

    // Start tracking server
    let track_addr = format!(
        "{}:{}",
        config.track_server.host, config.track_server.port
    );
    let track_listener = tokio::net::TcpListener::bind(&track_addr).await?;
    info!("🚀 Tracking server listening on http://{}", track_addr);
    info!(
        "   - Rewritten banners point at {}/track/...",
        config.tracking.public_base_url
    );

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>()
        ),
        axum::serve(
            track_listener,
            track_router.into_make_service_with_connect_info::<SocketAddr>()
        ),
    )?;

    Ok(())
}
