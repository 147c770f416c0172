//! The proxy-facing endpoints. Traefik's HTTP provider polls the config
//! endpoint; on a 500 it keeps the last valid document.

use crate::error::ApiResult;
use crate::server::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use gantry_assembler::AssemblerStatus;
use gantry_core::GantryError;
use serde_json::Value;
use std::sync::Arc;

/// GET /api/v1/traefik-config
///
/// Any build failure is a plain 500: the proxy treats every error the same
/// way (keep the last valid document), and this endpoint is not an admin
/// probe.
pub async fn get_config(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let doc = state
        .assembler
        .dynamic_config()
        .await
        .map_err(|e| GantryError::Internal(format!("assembly failed: {e}")))?;
    Ok(Json((*doc).clone()))
}

/// POST /api/v1/traefik-config/invalidate
pub async fn invalidate_config(State(state): State<Arc<AppState>>) -> StatusCode {
    state.assembler.invalidate().await;
    StatusCode::NO_CONTENT
}

/// GET /api/v1/traefik-config/status
pub async fn config_status(State(state): State<Arc<AppState>>) -> Json<AssemblerStatus> {
    Json(state.assembler.status().await)
}
