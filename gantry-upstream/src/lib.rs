//! Upstream adapters.
//!
//! Two upstream flavors exist: a general-purpose gateway API and the reverse
//! proxy's own read-only API. Both produce complete snapshots on every call;
//! callers diff against store state, never against previous snapshots.
//! Transient network and parse failures surface as the unavailable kind and
//! are retried on the next scheduler tick.

pub mod cache;
pub mod gateway;
pub mod native;
pub mod snapshot;

pub use cache::SnapshotCache;
pub use gateway::GatewayAdapter;
pub use native::NativeAdapter;
pub use snapshot::{Snapshot, UpstreamRouter, UpstreamService};

use arc_swap::ArcSwap;
use gantry_core::config::{BasicAuth, SourceConfig, SourceKind};
use gantry_core::{GantryError, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Closed variant over the two upstream flavors.
pub enum Upstream {
    Gateway(GatewayAdapter),
    Native(NativeAdapter),
}

impl Upstream {
    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        Ok(match cfg.kind {
            SourceKind::Gateway => Upstream::Gateway(GatewayAdapter::new(cfg)?),
            SourceKind::Traefik => Upstream::Native(NativeAdapter::new(cfg)?),
        })
    }

    /// Adapter name. Recorded as `source_type` on discovered rows.
    pub fn describe(&self) -> &'static str {
        match self {
            Upstream::Gateway(_) => gantry_core::normalize::SOURCE_GATEWAY,
            Upstream::Native(_) => gantry_core::normalize::SOURCE_TRAEFIK,
        }
    }

    pub async fn fetch_routers(&self) -> Result<Vec<UpstreamRouter>> {
        match self {
            Upstream::Gateway(a) => a.fetch_routers().await,
            Upstream::Native(a) => a.fetch_routers().await,
        }
    }

    pub async fn fetch_services(&self) -> Result<Vec<UpstreamService>> {
        match self {
            Upstream::Gateway(a) => a.fetch_services().await,
            Upstream::Native(a) => a.fetch_services().await,
        }
    }

    /// Complete upstream listing at one point in time.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let routers = self.fetch_routers().await?;
        let services = self.fetch_services().await?;
        Ok(Snapshot::new(routers, services))
    }

    pub async fn test_connection(&self) -> Result<()> {
        match self {
            Upstream::Gateway(a) => a.test_connection().await,
            Upstream::Native(a) => a.test_connection().await,
        }
    }

    /// The upstream's own merged dynamic-config document. Only the gateway
    /// flavor serves one; used by the assembler's proxied-fallback mode.
    pub async fn fetch_dynamic_config(&self) -> Result<serde_json::Value> {
        match self {
            Upstream::Gateway(a) => a.fetch_dynamic_config().await,
            Upstream::Native(_) => Err(GantryError::upstream(
                "native upstream does not serve a merged config document",
            )),
        }
    }
}

/// Hot-swappable handle to the active adapter. Switching data sources
/// replaces the adapter atomically.
pub struct UpstreamHandle {
    inner: ArcSwap<Upstream>,
}

impl UpstreamHandle {
    pub fn new(upstream: Upstream) -> Self {
        Self { inner: ArcSwap::from_pointee(upstream) }
    }

    pub fn get(&self) -> Arc<Upstream> {
        self.inner.load_full()
    }

    pub fn replace(&self, upstream: Upstream) {
        self.inner.store(Arc::new(upstream));
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(5))
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(GantryError::upstream)
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    auth: Option<&BasicAuth>,
) -> Result<T> {
    let mut req = client.get(url);
    if let Some(auth) = auth {
        req = req.basic_auth(&auth.username, Some(&auth.password));
    }
    let resp = req.send().await.map_err(GantryError::upstream)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(GantryError::upstream(format!("{url} returned {status}")));
    }
    resp.json::<T>().await.map_err(GantryError::upstream)
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
