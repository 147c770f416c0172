use crate::error::ApiResult;
use crate::server::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use gantry_core::GantryError;
use gantry_core::service::Service;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ServicePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Option<Value>,
}

fn validate(payload: &ServicePayload) -> Result<Value, GantryError> {
    if payload.name.trim().is_empty() {
        return Err(GantryError::validation("name must not be empty"));
    }
    if !Service::valid_type(&payload.kind) {
        return Err(GantryError::validation(format!(
            "invalid service type: {}",
            payload.kind
        )));
    }
    let config = payload.config.clone().unwrap_or_else(|| json!({}));
    if !config.is_object() {
        return Err(GantryError::validation("config must be a JSON object"));
    }
    Ok(config)
}

/// GET /api/services
pub async fn list_services(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let list = state.store.list_services().await?;
    Ok(Json(json!({"list": list, "total": list.len()})))
}

/// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Service>> {
    Ok(Json(state.store.get_service(&id).await?))
}

/// POST /api/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ServicePayload>,
) -> ApiResult<Json<Service>> {
    let config = validate(&payload)?;
    let now = Utc::now();
    let svc = Service {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        kind: payload.kind,
        config,
        created_at: now,
        updated_at: now,
    };
    state.store.create_service(&svc).await?;
    state.assembler.invalidate().await;
    Ok(Json(svc))
}

/// PUT /api/services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ServicePayload>,
) -> ApiResult<Json<Service>> {
    let config = validate(&payload)?;
    let svc = state.store.update_service(&id, &payload.name, &payload.kind, &config).await?;
    state.assembler.invalidate().await;
    Ok(Json(svc))
}

/// DELETE /api/services/:id
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_service(&id).await?;
    state.assembler.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}
