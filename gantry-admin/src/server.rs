use crate::handlers;
use axum::Router as AxumRouter;
use axum::routing::{delete, get, post, put};
use gantry_assembler::Assembler;
use gantry_core::config::{ServerConfig, SourceConfig};
use gantry_store::Store;
use gantry_upstream::{SnapshotCache, UpstreamHandle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

/// Shared state for the HTTP surface.
pub struct AppState {
    pub store: Store,
    pub upstream: Arc<UpstreamHandle>,
    pub snapshots: Arc<SnapshotCache>,
    pub assembler: Arc<Assembler>,
    /// Configured data sources, by name.
    pub sources: HashMap<String, SourceConfig>,
    /// Name of the currently active source.
    pub active_source: RwLock<String>,
    /// Config file rewritten when the active source changes.
    pub config_path: Option<PathBuf>,
}

/// Build the Axum router with all routes and layers.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> AxumRouter {
    let mut app = AxumRouter::new()
        // Liveness
        .route("/health", get(handlers::health::health_check))
        // Proxy-facing
        .route("/api/v1/traefik-config", get(handlers::traefik_config::get_config))
        .route(
            "/api/v1/traefik-config/invalidate",
            post(handlers::traefik_config::invalidate_config),
        )
        .route("/api/v1/traefik-config/status", get(handlers::traefik_config::config_status))
        // Middlewares
        .route("/api/middlewares", get(handlers::middlewares::list_middlewares))
        .route("/api/middlewares", post(handlers::middlewares::create_middleware))
        .route("/api/middlewares/{id}", get(handlers::middlewares::get_middleware))
        .route("/api/middlewares/{id}", put(handlers::middlewares::update_middleware))
        .route("/api/middlewares/{id}", delete(handlers::middlewares::delete_middleware))
        // Services
        .route("/api/services", get(handlers::services::list_services))
        .route("/api/services", post(handlers::services::create_service))
        .route("/api/services/{id}", get(handlers::services::get_service))
        .route("/api/services/{id}", put(handlers::services::update_service))
        .route("/api/services/{id}", delete(handlers::services::delete_service))
        // Resources
        .route("/api/resources", get(handlers::resources::list_resources))
        .route("/api/resources/{id}", get(handlers::resources::get_resource))
        .route("/api/resources/{id}", delete(handlers::resources::delete_resource))
        .route("/api/resources/{id}/config", put(handlers::resources::update_resource_config))
        .route("/api/resources/{id}/middlewares", post(handlers::resources::assign_middleware))
        .route(
            "/api/resources/{id}/middlewares/{middleware_id}",
            delete(handlers::resources::remove_middleware),
        )
        .route("/api/resources/{id}/service", put(handlers::resources::assign_service))
        .route("/api/resources/{id}/service", delete(handlers::resources::clear_service))
        // Data sources
        .route("/api/datasources", get(handlers::datasources::list_sources))
        .route("/api/datasources/{name}/activate", post(handlers::datasources::activate_source))
        .route("/api/datasources/{name}/test", post(handlers::datasources::test_source))
        // Singletons
        .route("/api/mtls", get(handlers::settings::get_mtls))
        .route("/api/mtls", put(handlers::settings::put_mtls))
        .route("/api/security", get(handlers::settings::get_security))
        .route("/api/security", put(handlers::settings::put_security));

    if let Some(ui_dir) = &config.ui_dir {
        app = app.fallback_service(ServeDir::new(ui_dir));
    }

    let mut app = app.with_state(state);
    if config.cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }
    app.layer(TimeoutLayer::new(Duration::from_secs(config.read_timeout_secs)))
        .layer(CatchPanicLayer::new())
}

/// Bind and serve until the shutdown signal flips. Connections drain within
/// the caller's grace window.
pub async fn serve(
    config: &ServerConfig,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = build_router(state, config);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}
