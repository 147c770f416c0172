// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Gantry — control-plane manager for Traefik dynamic configuration
//
//  Store:      SQLite (overrides are local truth, upstream owns existence)
//  Upstream:   gateway API / native Traefik API, polled on a timer
//  Serving:    axum; Traefik pulls /api/v1/traefik-config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use anyhow::Context;
use clap::Parser;
use gantry_admin::server::AppState;
use gantry_assembler::{Assembler, ConfigCache, spawn_janitor};
use gantry_core::GantryConfig;
use gantry_reconciler::Reconciler;
use gantry_store::Store;
use gantry_store::cleanup::{CleanupManager, CleanupOptions};
use gantry_upstream::{SnapshotCache, Upstream, UpstreamHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gantry", version, about = "Control-plane manager for Traefik")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// SQLite database path (overrides the config file)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Gantry starting");

    // ── Config ──
    let config_path = cli.config.as_ref().and_then(|p| p.to_str().map(String::from));
    let mut config = GantryConfig::load(config_path.as_deref())?;
    if let Some(db) = cli.database {
        config.database.path = db;
    }

    // ── Store (unopenable database or failed migration is fatal) ──
    let store = Store::open(&config.database.path).await?;
    let seeded = store.seed_templates().await?;
    if seeded > 0 {
        info!(seeded, "template middlewares seeded");
    }

    // ── Active upstream adapter ──
    let source_cfg = match config.active_source_config() {
        Some(cfg) => cfg.clone(),
        None => {
            let (name, cfg) = config
                .sources
                .iter()
                .map(|(name, cfg)| (name.clone(), cfg.clone()))
                .min_by(|a, b| a.0.cmp(&b.0))
                .context("no upstream data sources configured")?;
            warn!(
                missing = %config.active_source,
                fallback = %name,
                "active source not configured, falling back"
            );
            config.active_source = name;
            cfg
        }
    };
    let upstream = Arc::new(UpstreamHandle::new(Upstream::from_config(&source_cfg)?));
    info!(source = %config.active_source, adapter = upstream.get().describe(), "upstream adapter ready");

    // ── Assembler + caches ──
    let snapshots =
        Arc::new(SnapshotCache::new(Duration::from_secs(config.assembler.snapshot_ttl_secs)));
    let cache =
        Arc::new(ConfigCache::new(Duration::from_secs(config.assembler.config_cache_ttl_secs)));
    let assembler = Arc::new(Assembler::new(
        store.clone(),
        Arc::clone(&upstream),
        Arc::clone(&snapshots),
        Arc::clone(&cache),
        config.assembler.proxied_fallback,
    ));

    // ── Background workers ──
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cleanup = Arc::new(CleanupManager::new(
        store.clone(),
        CleanupOptions {
            recover_corrupted: config.cleanup.recover_corrupted,
            max_delete_batch: config.cleanup.max_delete_batch,
            deadline: Duration::from_secs(config.cleanup.deadline_secs),
        },
    ));
    let reconciler = Reconciler::new(
        store.clone(),
        Arc::clone(&upstream),
        Arc::clone(&cleanup),
        Duration::from_secs(config.reconcile.poll_interval_secs),
        Duration::from_secs(config.reconcile.cleanup_interval_secs),
    );
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown_rx.clone()));
    let janitor_handle = spawn_janitor(Arc::clone(&cache), shutdown_rx.clone());

    // ── HTTP server ──
    let state = Arc::new(AppState {
        store,
        upstream,
        snapshots,
        assembler,
        sources: config.sources.clone(),
        active_source: RwLock::new(config.active_source.clone()),
        config_path: cli.config.clone(),
    });
    let server_config = config.server.clone();
    let server_shutdown = shutdown_rx.clone();
    let mut server_handle = tokio::spawn(async move {
        gantry_admin::serve(&server_config, state, server_shutdown).await
    });

    info!(
        addr = %config.server.listen_addr,
        poll_secs = config.reconcile.poll_interval_secs,
        "Gantry is ready"
    );

    // ── Graceful shutdown ──
    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received, draining");
            let _ = shutdown_tx.send(true);

            let drain = Duration::from_secs(config.server.drain_timeout_secs);
            if tokio::time::timeout(drain, async {
                let _ = (&mut server_handle).await;
                let _ = reconciler_handle.await;
                let _ = janitor_handle.await;
            })
            .await
            .is_err()
            {
                warn!("drain window expired, forcing exit");
                server_handle.abort();
            }
        }
        result = &mut server_handle => {
            // listen failure or server crash is fatal
            let _ = shutdown_tx.send(true);
            match result {
                Ok(inner) => inner?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!("Gantry stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
