//! Data-source management: listing, probing, and atomically switching the
//! active upstream adapter.

use crate::error::ApiResult;
use crate::persist;
use crate::server::AppState;
use axum::Json;
use axum::extract::{Path, State};
use gantry_core::GantryError;
use gantry_core::config::SourceKind;
use gantry_upstream::Upstream;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

fn kind_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Gateway => "gateway",
        SourceKind::Traefik => "traefik",
    }
}

/// GET /api/datasources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let active = state.active_source.read().await.clone();
    let mut list: Vec<Value> = state
        .sources
        .iter()
        .map(|(name, cfg)| {
            json!({
                "name": name,
                "kind": kind_label(cfg.kind),
                "base_url": cfg.base_url,
                "active": *name == active,
            })
        })
        .collect();
    list.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    Ok(Json(json!({"list": list, "total": list.len()})))
}

/// POST /api/datasources/:name/activate
///
/// Swaps the adapter atomically, persists the choice, and purges both
/// caches so the next build sees the new upstream.
pub async fn activate_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let cfg = state
        .sources
        .get(&name)
        .ok_or_else(|| GantryError::not_found(format!("data source {name}")))?;

    let upstream = Upstream::from_config(cfg)?;
    state.upstream.replace(upstream);
    *state.active_source.write().await = name.clone();

    if let Some(path) = &state.config_path {
        persist::persist_active_source(path, &name);
    }

    state.snapshots.invalidate().await;
    state.assembler.invalidate().await;
    info!(source = %name, "active data source switched");

    Ok(Json(json!({"active": name})))
}

/// POST /api/datasources/:name/test
pub async fn test_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let cfg = state
        .sources
        .get(&name)
        .ok_or_else(|| GantryError::not_found(format!("data source {name}")))?;

    Upstream::from_config(cfg)?.test_connection().await?;
    Ok(Json(json!({"name": name, "ok": true})))
}
