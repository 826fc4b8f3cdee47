#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web JSON API for population-by-age series.
//!
//! Exposes the dataset presentation contract (`/api/regions`,
//! `/api/series/{region}`) plus coverage and horizon endpoints. A
//! background task re-checks the data horizon periodically; when it
//! changes the cache is cleared and rebuilt before the next response.

mod handlers;
pub mod interactive;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use population_dataset::{DatasetCache, cache_from_config};
use population_source::config::SourceConfig;

/// Default period between background horizon checks.
pub const DEFAULT_REFRESH_SECS: u64 = 3600;

/// Shared application state.
pub struct AppState {
    pub cache: Arc<DatasetCache>,
}

/// Listener and refresh settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Period between horizon checks; `None` disables the background
    /// task.
    pub refresh_interval: Option<Duration>,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT` and `POPULATION_HORIZON_REFRESH_SECS`.
    /// A refresh period of `0` disables background checks.
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let refresh_secs = std::env::var("POPULATION_HORIZON_REFRESH_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_SECS);

        Self {
            bind_addr,
            port,
            refresh_interval: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/regions", web::get().to(handlers::regions))
            .route("/series/{region}", web::get().to(handlers::series))
            .route("/coverage", web::get().to(handlers::coverage))
            .route("/horizon/refresh", web::post().to(handlers::refresh_horizon)),
    );
}

/// Periodically re-checks the horizon and rebuilds the dataset on
/// change, so the first request after a change does not pay for the
/// rebuild.
pub fn spawn_horizon_refresh(cache: Arc<DatasetCache>, period: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial build already
        // ran discovery.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if cache.refresh_horizon().await.is_changed() {
                match cache.dataset().await {
                    Ok(dataset) => log::info!(
                        "Rebuilt dataset for horizon {} ({} records)",
                        dataset.horizon,
                        dataset.records.len()
                    ),
                    Err(e) => log::error!("Failed to rebuild dataset after horizon change: {e}"),
                }
            }
        }
    });
}

/// Starts the population trend API server.
///
/// Builds the dataset cache from the environment, warms it, and serves
/// until shutdown. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if configuration is invalid or the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::try_init_custom_env("RUST_LOG").ok();

    let source_config = SourceConfig::from_env().map_err(std::io::Error::other)?;
    let server_config = ServerConfig::from_env();
    let cache = Arc::new(cache_from_config(&source_config).map_err(std::io::Error::other)?);

    log::info!(
        "Warming dataset for {} ({} regions)...",
        source_config.table.table_id,
        source_config.table.regions.len()
    );
    match cache.dataset().await {
        Ok(dataset) => log::info!(
            "Dataset ready: horizon {}, {} records{}",
            dataset.horizon,
            dataset.records.len(),
            if dataset.is_partial() { " (partial)" } else { "" }
        ),
        // Requests retry the build; the server still starts.
        Err(e) => log::error!("Initial dataset build failed: {e}"),
    }

    if let Some(period) = server_config.refresh_interval {
        log::info!("Checking horizon every {}s", period.as_secs());
        spawn_horizon_refresh(Arc::clone(&cache), period);
    }

    let state = web::Data::new(AppState { cache });

    let ServerConfig {
        bind_addr, port, ..
    } = server_config;
    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
