use crate::error::ApiResult;
use crate::server::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use gantry_core::GantryError;
use gantry_core::middleware::Middleware;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct MiddlewarePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Option<Value>,
}

fn validate(payload: &MiddlewarePayload) -> Result<Value, GantryError> {
    if payload.name.trim().is_empty() {
        return Err(GantryError::validation("name must not be empty"));
    }
    if payload.kind.trim().is_empty() {
        return Err(GantryError::validation("type must not be empty"));
    }
    let config = payload.config.clone().unwrap_or_else(|| json!({}));
    if !config.is_object() {
        return Err(GantryError::validation("config must be a JSON object"));
    }
    Ok(config)
}

/// GET /api/middlewares
pub async fn list_middlewares(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let list = state.store.list_middlewares().await?;
    Ok(Json(json!({"list": list, "total": list.len()})))
}

/// GET /api/middlewares/:id
pub async fn get_middleware(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Middleware>> {
    Ok(Json(state.store.get_middleware(&id).await?))
}

/// POST /api/middlewares
pub async fn create_middleware(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MiddlewarePayload>,
) -> ApiResult<Json<Middleware>> {
    let config = validate(&payload)?;
    let now = Utc::now();
    let mw = Middleware {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        kind: payload.kind,
        config,
        created_at: now,
        updated_at: now,
    };
    state.store.create_middleware(&mw).await?;
    state.assembler.invalidate().await;
    Ok(Json(mw))
}

/// PUT /api/middlewares/:id
pub async fn update_middleware(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<MiddlewarePayload>,
) -> ApiResult<Json<Middleware>> {
    let config = validate(&payload)?;
    let mw = state.store.update_middleware(&id, &payload.name, &payload.kind, &config).await?;
    state.assembler.invalidate().await;
    Ok(Json(mw))
}

/// DELETE /api/middlewares/:id
pub async fn delete_middleware(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_middleware(&id).await?;
    state.assembler.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}
