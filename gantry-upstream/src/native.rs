//! Native upstream: the reverse proxy's read-only API.
//!
//! Router and service shapes follow Traefik's documented API. Routers
//! without a parseable `Host(...)` rule are skipped; they cannot be keyed by
//! host and the admin surface has nothing to attach to them.

use crate::snapshot::{UpstreamRouter, UpstreamService};
use crate::{get_json, http_client, trim_base_url};
use gantry_core::Result;
use gantry_core::config::{BasicAuth, SourceConfig};
use serde::Deserialize;
use tracing::debug;

pub struct NativeAdapter {
    base_url: String,
    basic_auth: Option<BasicAuth>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeRouter {
    name: String,
    #[serde(default)]
    rule: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    middlewares: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NativeService {
    name: String,
    #[serde(flatten)]
    rest: serde_json::Value,
}

impl NativeAdapter {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base_url: trim_base_url(&cfg.base_url),
            basic_auth: cfg.basic_auth.clone(),
            client: http_client()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn fetch_routers(&self) -> Result<Vec<UpstreamRouter>> {
        let routers: Vec<NativeRouter> =
            get_json(&self.client, &self.url("/api/http/routers"), self.basic_auth.as_ref())
                .await?;
        Ok(routers_from_api(routers))
    }

    pub async fn fetch_services(&self) -> Result<Vec<UpstreamService>> {
        let services: Vec<NativeService> =
            get_json(&self.client, &self.url("/api/http/services"), self.basic_auth.as_ref())
                .await?;
        Ok(services
            .into_iter()
            .map(|s| UpstreamService { id: s.name, raw: s.rest })
            .collect())
    }

    pub async fn test_connection(&self) -> Result<()> {
        let _: serde_json::Value =
            get_json(&self.client, &self.url("/api/version"), self.basic_auth.as_ref()).await?;
        Ok(())
    }
}

fn routers_from_api(routers: Vec<NativeRouter>) -> Vec<UpstreamRouter> {
    routers
        .into_iter()
        .filter_map(|r| match host_from_rule(&r.rule) {
            Some(host) => Some(UpstreamRouter {
                id: r.name,
                host,
                service_id: r.service,
                org_id: String::new(),
                site_id: String::new(),
                middlewares: r.middlewares,
            }),
            None => {
                debug!(router = %r.name, "skipping router without Host rule");
                None
            }
        })
        .collect()
}

/// First host in a Traefik matcher rule: ``Host(`example.com`)``.
pub fn host_from_rule(rule: &str) -> Option<String> {
    let start = rule.find("Host(`")? + "Host(`".len();
    let rest = &rule[start..];
    let end = rest.find('`')?;
    if end == 0 { None } else { Some(rest[..end].to_string()) }
}
