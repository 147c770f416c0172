use crate::error::ApiResult;
use crate::server::AppState;
use axum::Json;
use axum::extract::State;
use gantry_core::GantryError;
use gantry_core::settings::{MtlsConfig, SecurityConfig};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct MtlsPayload {
    pub enabled: bool,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SecurityPayload {
    pub config: Value,
}

/// GET /api/mtls
pub async fn get_mtls(State(state): State<Arc<AppState>>) -> ApiResult<Json<MtlsConfig>> {
    Ok(Json(state.store.get_mtls_config().await?))
}

/// PUT /api/mtls
pub async fn put_mtls(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MtlsPayload>,
) -> ApiResult<Json<MtlsConfig>> {
    let config = payload.config.unwrap_or_else(|| json!({}));
    if !config.is_object() {
        return Err(GantryError::validation("config must be a JSON object").into());
    }
    let saved = state.store.put_mtls_config(payload.enabled, &config).await?;
    state.assembler.invalidate().await;
    Ok(Json(saved))
}

/// GET /api/security
pub async fn get_security(State(state): State<Arc<AppState>>) -> ApiResult<Json<SecurityConfig>> {
    Ok(Json(state.store.get_security_config().await?))
}

/// PUT /api/security
pub async fn put_security(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SecurityPayload>,
) -> ApiResult<Json<SecurityConfig>> {
    if !payload.config.is_object() {
        return Err(GantryError::validation("config must be a JSON object").into());
    }
    let saved = state.store.put_security_config(&payload.config).await?;
    state.assembler.invalidate().await;
    Ok(Json(saved))
}
