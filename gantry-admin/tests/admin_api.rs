//! Integration tests for the HTTP surface.
//!
//! Uses `tower::ServiceExt::oneshot` to call handlers without binding a real
//! TCP port — every test gets a fresh in-memory state.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use gantry_admin::server::{AppState, build_router};
use gantry_assembler::{Assembler, ConfigCache};
use gantry_core::config::{ServerConfig, SourceConfig, SourceKind};
use gantry_core::resource::{Resource, ResourceStatus};
use gantry_store::{Store, resources};
use gantry_upstream::{Snapshot, SnapshotCache, Upstream, UpstreamHandle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceExt; // .oneshot()

// ── Helpers ───────────────────────────────────────────────────

fn dead_source() -> SourceConfig {
    SourceConfig {
        kind: SourceKind::Gateway,
        base_url: "http://127.0.0.1:1".to_string(),
        basic_auth: None,
        site_id: None,
    }
}

async fn make_state() -> Arc<AppState> {
    let store = Store::open_in_memory().await.unwrap();
    let upstream = Arc::new(UpstreamHandle::new(Upstream::from_config(&dead_source()).unwrap()));
    let snapshots = Arc::new(SnapshotCache::new(Duration::from_secs(3600)));
    snapshots.put(Snapshot::new(vec![], vec![])).await;
    let cache = Arc::new(ConfigCache::new(Duration::from_secs(3600)));
    let assembler = Arc::new(Assembler::new(
        store.clone(),
        Arc::clone(&upstream),
        Arc::clone(&snapshots),
        cache,
        false,
    ));

    let mut sources = HashMap::new();
    sources.insert("gateway".to_string(), dead_source());

    Arc::new(AppState {
        store,
        upstream,
        snapshots,
        assembler,
        sources,
        active_source: RwLock::new("gateway".to_string()),
        config_path: None,
    })
}

fn app(state: Arc<AppState>) -> axum::Router {
    build_router(state, &ServerConfig::default())
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().method(Method::GET).uri(uri).body(Body::empty()).unwrap()
}

fn delete_req(uri: &str) -> Request<Body> {
    Request::builder().method(Method::DELETE).uri(uri).body(Body::empty()).unwrap()
}

fn json_req(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn insert_resource(state: &Arc<AppState>, id: &str, host: &str) {
    let now = Utc::now();
    let r = Resource {
        id: id.to_string(),
        host: host.to_string(),
        service_id: format!("{id}-svc"),
        org_id: String::new(),
        site_id: String::new(),
        status: ResourceStatus::Active,
        entrypoints: "websecure".to_string(),
        tls_domains: String::new(),
        tcp_enabled: false,
        tcp_entrypoints: String::new(),
        tcp_sni_rule: String::new(),
        custom_headers: String::new(),
        router_priority: 100,
        mtls_override: String::new(),
        source_type: "gateway".to_string(),
        created_at: now,
        updated_at: now,
    };
    state.store.with_transaction(async |conn| resources::insert(conn, &r).await).await.unwrap();
}

// ── Health ────────────────────────────────────────────────────

#[tokio::test]
async fn health_check_returns_200() {
    let resp = app(make_state().await).oneshot(get_req("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ── Proxy-facing config ───────────────────────────────────────

#[tokio::test]
async fn traefik_config_serves_merged_document() {
    let state = make_state().await;
    insert_resource(&state, "r1", "app.example.com").await;

    let resp = app(Arc::clone(&state)).oneshot(get_req("/api/v1/traefik-config")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let doc = body_json(resp).await;
    assert_eq!(doc["http"]["routers"]["r1"]["rule"], "Host(`app.example.com`)");
}

#[tokio::test]
async fn invalidate_returns_204_and_forces_rebuild() {
    let state = make_state().await;
    insert_resource(&state, "r1", "app.example.com").await;

    // prime the cache
    app(Arc::clone(&state)).oneshot(get_req("/api/v1/traefik-config")).await.unwrap();

    // mutate behind the cache's back, then invalidate through the endpoint
    insert_resource(&state, "r2", "b.example.com").await;
    let resp = app(Arc::clone(&state))
        .oneshot(json_req(Method::POST, "/api/v1/traefik-config/invalidate", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app(Arc::clone(&state)).oneshot(get_req("/api/v1/traefik-config")).await.unwrap();
    let doc = body_json(resp).await;
    assert!(doc["http"]["routers"]["r2"].is_object());
}

#[tokio::test]
async fn status_reports_assembler_state() {
    let state = make_state().await;
    app(Arc::clone(&state)).oneshot(get_req("/api/v1/traefik-config")).await.unwrap();

    let resp =
        app(Arc::clone(&state)).oneshot(get_req("/api/v1/traefik-config/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let status = body_json(resp).await;
    assert!(status["last_build_time"].is_string());
    assert!(status["cache_age_secs"].is_u64());
    assert_eq!(status["upstream_ok"], false);
}

// ── Middlewares ───────────────────────────────────────────────

#[tokio::test]
async fn middleware_create_returns_entity() {
    let state = make_state().await;
    let resp = app(state)
        .oneshot(json_req(
            Method::POST,
            "/api/middlewares",
            serde_json::json!({"name": "rate", "type": "rateLimit", "config": {"average": 10}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mw = body_json(resp).await;
    assert_eq!(mw["name"], "rate");
    assert_eq!(mw["type"], "rateLimit");
    assert!(mw["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn middleware_empty_name_is_400() {
    let state = make_state().await;
    let resp = app(state)
        .oneshot(json_req(
            Method::POST,
            "/api/middlewares",
            serde_json::json!({"name": "", "type": "headers"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = body_json(resp).await;
    assert_eq!(err["code"], 400);
}

#[tokio::test]
async fn middleware_duplicate_name_is_409() {
    let state = make_state().await;
    let payload = serde_json::json!({"name": "dup", "type": "headers"});
    app(Arc::clone(&state))
        .oneshot(json_req(Method::POST, "/api/middlewares", payload.clone()))
        .await
        .unwrap();

    let resp = app(Arc::clone(&state))
        .oneshot(json_req(Method::POST, "/api/middlewares", payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["code"], 409);
}

#[tokio::test]
async fn middleware_get_missing_is_404() {
    let state = make_state().await;
    let resp = app(state).oneshot(get_req("/api/middlewares/ghost")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    // error body carries the same code as the HTTP status
}

#[tokio::test]
async fn middleware_delete_returns_204() {
    let state = make_state().await;
    let resp = app(Arc::clone(&state))
        .oneshot(json_req(
            Method::POST,
            "/api/middlewares",
            serde_json::json!({"name": "gone", "type": "headers"}),
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = app(Arc::clone(&state))
        .oneshot(delete_req(&format!("/api/middlewares/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp =
        app(Arc::clone(&state)).oneshot(get_req(&format!("/api/middlewares/{id}"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn middleware_malformed_json_is_client_error() {
    let state = make_state().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/middlewares")
        .header("content-type", "application/json")
        .body(Body::from("not-json"))
        .unwrap();
    let resp = app(state).oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error());
}

// ── Services ──────────────────────────────────────────────────

#[tokio::test]
async fn service_invalid_type_is_400() {
    let state = make_state().await;
    let resp = app(state)
        .oneshot(json_req(
            Method::POST,
            "/api/services",
            serde_json::json!({"name": "svc", "type": "bogus"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn service_create_and_list() {
    let state = make_state().await;
    app(Arc::clone(&state))
        .oneshot(json_req(
            Method::POST,
            "/api/services",
            serde_json::json!({"name": "lb", "type": "loadBalancer",
                "config": {"servers": [{"url": "http://10.0.0.1"}]}}),
        ))
        .await
        .unwrap();

    let resp = app(Arc::clone(&state)).oneshot(get_req("/api/services")).await.unwrap();
    let list = body_json(resp).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["list"][0]["name"], "lb");
}

// ── Resources ─────────────────────────────────────────────────

#[tokio::test]
async fn resource_config_update_missing_is_404() {
    let state = make_state().await;
    let resp = app(state)
        .oneshot(json_req(
            Method::PUT,
            "/api/resources/ghost/config",
            serde_json::json!({"router_priority": 5}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resource_override_flows_into_served_config() {
    let state = make_state().await;
    insert_resource(&state, "r1", "app.example.com").await;

    let resp = app(Arc::clone(&state))
        .oneshot(json_req(
            Method::PUT,
            "/api/resources/r1/config",
            serde_json::json!({"router_priority": 9, "tls_domains": "app.example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app(Arc::clone(&state)).oneshot(get_req("/api/v1/traefik-config")).await.unwrap();
    let doc = body_json(resp).await;
    assert_eq!(doc["http"]["routers"]["r1"]["priority"], 9);
    assert_eq!(doc["http"]["routers"]["r1"]["tls"]["domains"][0]["main"], "app.example.com");
}

#[tokio::test]
async fn middleware_assignment_returns_404_for_missing_parts() {
    let state = make_state().await;
    insert_resource(&state, "r1", "app.example.com").await;

    let resp = app(Arc::clone(&state))
        .oneshot(json_req(
            Method::POST,
            "/api/resources/r1/middlewares",
            serde_json::json!({"middleware_id": "ghost"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Data sources ──────────────────────────────────────────────

#[tokio::test]
async fn datasources_list_marks_active() {
    let state = make_state().await;
    let resp = app(state).oneshot(get_req("/api/datasources")).await.unwrap();
    let list = body_json(resp).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["list"][0]["name"], "gateway");
    assert_eq!(list["list"][0]["active"], true);
}

#[tokio::test]
async fn activate_unknown_source_is_404() {
    let state = make_state().await;
    let resp = app(state)
        .oneshot(json_req(Method::POST, "/api/datasources/ghost/activate", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unreachable_source_is_503() {
    let state = make_state().await;
    let resp = app(state)
        .oneshot(json_req(Method::POST, "/api/datasources/gateway/test", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["code"], 503);
}

// ── Singletons ────────────────────────────────────────────────

#[tokio::test]
async fn mtls_round_trip_through_api() {
    let state = make_state().await;
    let resp = app(Arc::clone(&state))
        .oneshot(json_req(
            Method::PUT,
            "/api/mtls",
            serde_json::json!({"enabled": true, "config": {"clientAuth": {"clientAuthType": "RequireAndVerifyClientCert"}}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app(Arc::clone(&state)).oneshot(get_req("/api/mtls")).await.unwrap();
    let mtls = body_json(resp).await;
    assert_eq!(mtls["enabled"], true);
    assert_eq!(mtls["id"], 1);
}
