//! On-demand assembly of the merged dynamic-configuration document.
//!
//! The document Traefik's HTTP provider pulls is built from two inputs: the
//! local store (overrides are its source of truth) and the current upstream
//! snapshot. A single read transaction snapshots all tables at once, so a
//! served document is never partial.

pub mod cache;
pub mod coerce;

pub use cache::{ConfigCache, spawn_janitor};

use chrono::{DateTime, Utc};
use gantry_core::middleware::Middleware;
use gantry_core::normalize::{add_provider_suffix, determine_provider_suffix, normalize};
use gantry_core::resource::Resource;
use gantry_core::service::Service;
use gantry_core::settings::{MTLS_OPTIONS_NAME, MtlsConfig};
use gantry_core::Result;
use gantry_store::{Store, relations, resources, settings};
use gantry_upstream::{Snapshot, SnapshotCache, UpstreamHandle};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds and caches the served document.
pub struct Assembler {
    store: Store,
    upstream: Arc<UpstreamHandle>,
    snapshots: Arc<SnapshotCache>,
    cache: Arc<ConfigCache>,
    proxied_fallback: bool,
}

/// Assembler state reported on the status endpoint.
#[derive(Debug, Serialize)]
pub struct AssemblerStatus {
    pub last_build_time: Option<DateTime<Utc>>,
    pub cache_age_secs: Option<u64>,
    pub upstream_ok: bool,
}

/// Everything the builder reads from the store, collected in one
/// transaction.
struct StoreView {
    resources: Vec<Resource>,
    chains: HashMap<String, Vec<Middleware>>,
    service_overrides: HashMap<String, Service>,
    mtls: MtlsConfig,
}

impl Assembler {
    pub fn new(
        store: Store,
        upstream: Arc<UpstreamHandle>,
        snapshots: Arc<SnapshotCache>,
        cache: Arc<ConfigCache>,
        proxied_fallback: bool,
    ) -> Self {
        Self { store, upstream, snapshots, cache, proxied_fallback }
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    /// The served document: cache hit, or a fresh build on miss.
    pub async fn dynamic_config(&self) -> Result<Arc<Value>> {
        if let Some(doc) = self.cache.get().await {
            return Ok(doc);
        }
        let doc = self.build().await?;
        Ok(self.cache.put(doc).await)
    }

    /// Evict the cached document. The next request rebuilds.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    pub async fn status(&self) -> AssemblerStatus {
        AssemblerStatus {
            last_build_time: self.cache.last_build_time().await,
            cache_age_secs: self.cache.age().await.map(|age| age.as_secs()),
            upstream_ok: self.upstream.get().test_connection().await.is_ok(),
        }
    }

    async fn build(&self) -> Result<Value> {
        let upstream = self.upstream.get();
        let active_adapter = upstream.describe();
        let snapshot = self.snapshots.get_or_fetch(&upstream).await?;
        let view = self.load_view().await?;
        debug!(
            resources = view.resources.len(),
            adapter = active_adapter,
            proxied = self.proxied_fallback,
            "assembling dynamic config"
        );

        let synthesized = synthesize(&view, &snapshot, active_adapter);
        if !self.proxied_fallback {
            return Ok(synthesized);
        }

        let mut doc = upstream.fetch_dynamic_config().await?;
        overlay(&mut doc, &synthesized);
        Ok(doc)
    }

    async fn load_view(&self) -> Result<StoreView> {
        self.store
            .with_transaction(async |conn| {
                let resources = resources::all(conn).await?;
                let mut chains = HashMap::new();
                let mut service_overrides = HashMap::new();
                for r in resources.iter().filter(|r| r.is_active()) {
                    let chain = relations::middlewares_for_resource(conn, &r.id).await?;
                    if !chain.is_empty() {
                        chains.insert(r.id.clone(), chain);
                    }
                    if let Some(svc) = relations::service_for_resource(conn, &r.id).await? {
                        service_overrides.insert(r.id.clone(), svc);
                    }
                }
                let mtls = settings::get_mtls(conn).await?;
                Ok(StoreView { resources, chains, service_overrides, mtls })
            })
            .await
    }
}

/// Build the document from a fixed store view and upstream snapshot.
/// Deterministic: object keys serialize sorted and every list has a stable
/// order.
fn synthesize(view: &StoreView, snapshot: &Snapshot, active_adapter: &str) -> Value {
    let mut http_routers = Map::new();
    let mut http_middlewares = Map::new();
    let mut http_services = Map::new();
    let mut tcp_routers = Map::new();

    // inherited middlewares, looked up by canonical router id
    let mut inherited: HashMap<String, &[String]> = HashMap::new();
    for router in &snapshot.routers {
        inherited.insert(normalize(&router.id), router.middlewares.as_slice());
    }

    for resource in view.resources.iter().filter(|r| r.is_active()) {
        if resource.host.is_empty() {
            continue;
        }

        let mut middleware_refs: Vec<String> = Vec::new();
        if let Some(chain) = view.chains.get(&resource.id) {
            for mw in chain {
                http_middlewares.insert(
                    mw.id.clone(),
                    keyed(&mw.kind, coerce::coerce_middleware_config(&mw.kind, &mw.config)),
                );
                middleware_refs.push(mw.id.clone());
            }
        }
        if let Some(headers) = custom_headers_middleware(resource) {
            let name = format!("{}-headers", resource.id);
            http_middlewares.insert(name.clone(), headers);
            middleware_refs.push(name);
        }
        if let Some(upstream_chain) = inherited.get(&resource.id) {
            for name in upstream_chain.iter() {
                if !middleware_refs.contains(name) {
                    middleware_refs.push(name.clone());
                }
            }
        }

        let service_ref = match view.service_overrides.get(&resource.id) {
            Some(svc) => {
                http_services.insert(
                    svc.id.clone(),
                    keyed(&svc.kind, coerce::coerce_service_config(&svc.config)),
                );
                svc.id.clone()
            }
            None => add_provider_suffix(
                &resource.service_id,
                determine_provider_suffix(&resource.source_type, active_adapter),
            ),
        };

        let mut router = Map::new();
        router.insert("rule".into(), json!(format!("Host(`{}`)", resource.host)));
        router.insert("entryPoints".into(), json!(resource.entrypoint_list()));
        router.insert("service".into(), json!(service_ref.clone()));
        router.insert("priority".into(), json!(resource.router_priority));
        if !middleware_refs.is_empty() {
            router.insert("middlewares".into(), json!(middleware_refs));
        }
        if let Some(tls) = tls_section(resource, &view.mtls) {
            router.insert("tls".into(), tls);
        }
        http_routers.insert(resource.id.clone(), Value::Object(router));

        if resource.tcp_enabled {
            let rule = if resource.tcp_sni_rule.is_empty() {
                format!("HostSNI(`{}`)", resource.host)
            } else {
                resource.tcp_sni_rule.clone()
            };
            tcp_routers.insert(
                format!("{}-tcp", resource.id),
                json!({
                    "rule": rule,
                    "entryPoints": resource.tcp_entrypoint_list(),
                    "service": service_ref,
                    "tls": { "passthrough": true },
                }),
            );
        }
    }

    let mut root = Map::new();
    root.insert(
        "http".into(),
        json!({
            "routers": http_routers,
            "middlewares": http_middlewares,
            "services": http_services,
        }),
    );
    if !tcp_routers.is_empty() {
        root.insert("tcp".into(), json!({ "routers": tcp_routers }));
    }
    if view.mtls.enabled {
        let options = keyed(
            MTLS_OPTIONS_NAME,
            coerce::coerce_middleware_config("tlsOptions", &view.mtls.config),
        );
        root.insert("tls".into(), json!({ "options": options }));
    }
    Value::Object(root)
}

/// Single-entry object: `{<key>: value}`.
fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Synthesized headers middleware for a resource's opaque header blob.
fn custom_headers_middleware(resource: &Resource) -> Option<Value> {
    if resource.custom_headers.trim().is_empty() {
        return None;
    }
    let headers: Map<String, Value> = serde_json::from_str(&resource.custom_headers).ok()?;
    if headers.is_empty() {
        return None;
    }
    Some(json!({ "headers": { "customRequestHeaders": headers } }))
}

fn tls_section(resource: &Resource, mtls: &MtlsConfig) -> Option<Value> {
    let domains = resource.tls_domain_list();
    let (main, sans) = domains.split_first()?;

    let mut tls = Map::new();
    tls.insert("domains".into(), json!([{ "main": main, "sans": sans }]));
    if mtls.enabled && !mtls_disabled_for(resource) {
        tls.insert("options".into(), json!(MTLS_OPTIONS_NAME));
    }
    Some(Value::Object(tls))
}

/// A per-resource override blob of `{"enabled": false}` opts the router out
/// of the global mTLS options.
fn mtls_disabled_for(resource: &Resource) -> bool {
    serde_json::from_str::<Value>(&resource.mtls_override)
        .map(|v| v["enabled"] == json!(false))
        .unwrap_or(false)
}

/// Overlay our synthesized sections onto a proxied upstream document.
/// Keyed by canonical id, last-wins: any upstream entry whose name
/// canonicalizes to one of ours is replaced.
fn overlay(doc: &mut Value, ours: &Value) {
    for path in [
        ["http", "routers"],
        ["http", "middlewares"],
        ["http", "services"],
        ["tcp", "routers"],
        ["tls", "options"],
    ] {
        let Some(our_section) = ours.pointer(&format!("/{}/{}", path[0], path[1])) else {
            continue;
        };
        let Some(our_map) = our_section.as_object() else {
            continue;
        };
        if our_map.is_empty() {
            continue;
        }

        let doc_map = section_mut(doc, &path);
        for (key, value) in our_map {
            let canonical = normalize(key);
            doc_map.retain(|existing, _| normalize(existing) != canonical);
            doc_map.insert(key.clone(), value.clone());
        }
    }
}

fn section_mut<'a>(doc: &'a mut Value, path: &[&str]) -> &'a mut Map<String, Value> {
    let mut current = doc;
    for key in path {
        let map = ensure_object(current);
        current = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
