use crate::error::ApiResult;
use crate::server::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use gantry_core::resource::Resource;
use gantry_store::resources::ResourceOverridePatch;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Override fields only; upstream-derived fields belong to the reconciler.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceConfigPayload {
    pub entrypoints: Option<String>,
    pub tls_domains: Option<String>,
    pub tcp_enabled: Option<bool>,
    pub tcp_entrypoints: Option<String>,
    pub tcp_sni_rule: Option<String>,
    pub custom_headers: Option<String>,
    pub router_priority: Option<i64>,
    pub mtls_override: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignMiddlewarePayload {
    pub middleware_id: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssignServicePayload {
    pub service_id: String,
}

fn default_priority() -> i64 {
    100
}

/// GET /api/resources
pub async fn list_resources(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let list = state.store.list_resources().await?;
    Ok(Json(json!({"list": list, "total": list.len()})))
}

/// GET /api/resources/:id
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.store.get_resource(&id).await?))
}

/// DELETE /api/resources/:id
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_resource(&id).await?;
    state.assembler.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/resources/:id/config
pub async fn update_resource_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ResourceConfigPayload>,
) -> ApiResult<Json<Resource>> {
    let patch = ResourceOverridePatch {
        entrypoints: payload.entrypoints,
        tls_domains: payload.tls_domains,
        tcp_enabled: payload.tcp_enabled,
        tcp_entrypoints: payload.tcp_entrypoints,
        tcp_sni_rule: payload.tcp_sni_rule,
        custom_headers: payload.custom_headers,
        router_priority: payload.router_priority,
        mtls_override: payload.mtls_override,
    };
    let resource = state.store.update_resource_overrides(&id, &patch).await?;
    state.assembler.invalidate().await;
    Ok(Json(resource))
}

/// POST /api/resources/:id/middlewares
pub async fn assign_middleware(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AssignMiddlewarePayload>,
) -> ApiResult<Json<Value>> {
    state.store.assign_middleware(&id, &payload.middleware_id, payload.priority).await?;
    state.assembler.invalidate().await;
    Ok(Json(json!({
        "resource_id": id,
        "middleware_id": payload.middleware_id,
        "priority": payload.priority,
    })))
}

/// DELETE /api/resources/:id/middlewares/:middleware_id
pub async fn remove_middleware(
    State(state): State<Arc<AppState>>,
    Path((id, middleware_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.store.remove_middleware_assignment(&id, &middleware_id).await?;
    state.assembler.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/resources/:id/service
pub async fn assign_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AssignServicePayload>,
) -> ApiResult<Json<Value>> {
    state.store.assign_service(&id, &payload.service_id).await?;
    state.assembler.invalidate().await;
    Ok(Json(json!({"resource_id": id, "service_id": payload.service_id})))
}

/// DELETE /api/resources/:id/service
pub async fn clear_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.clear_service_assignment(&id).await?;
    state.assembler.invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}
