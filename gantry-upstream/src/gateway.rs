//! Gateway upstream: a general-purpose API listing resources per site.

use crate::snapshot::{UpstreamRouter, UpstreamService};
use crate::{get_json, http_client, trim_base_url};
use gantry_core::Result;
use gantry_core::config::{BasicAuth, SourceConfig};
use serde::Deserialize;

pub struct GatewayAdapter {
    base_url: String,
    site_id: Option<String>,
    basic_auth: Option<BasicAuth>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayResource {
    resource_id: String,
    host: String,
    #[serde(default)]
    service_id: String,
    #[serde(default)]
    org_id: String,
    #[serde(default)]
    site_id: String,
    #[serde(default)]
    middlewares: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayService {
    service_id: String,
    #[serde(flatten)]
    rest: serde_json::Value,
}

impl GatewayAdapter {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base_url: trim_base_url(&cfg.base_url),
            site_id: cfg.site_id.clone(),
            basic_auth: cfg.basic_auth.clone(),
            client: http_client()?,
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.site_id {
            Some(site) => format!("{}/{path}?siteId={site}", self.base_url),
            None => format!("{}/{path}", self.base_url),
        }
    }

    pub async fn fetch_routers(&self) -> Result<Vec<UpstreamRouter>> {
        let resources: Vec<GatewayResource> =
            get_json(&self.client, &self.url("resources"), self.basic_auth.as_ref()).await?;
        Ok(resources.into_iter().map(router_from_resource).collect())
    }

    pub async fn fetch_services(&self) -> Result<Vec<UpstreamService>> {
        let services: Vec<GatewayService> =
            get_json(&self.client, &self.url("services"), self.basic_auth.as_ref()).await?;
        Ok(services
            .into_iter()
            .map(|s| UpstreamService { id: s.service_id, raw: s.rest })
            .collect())
    }

    pub async fn fetch_dynamic_config(&self) -> Result<serde_json::Value> {
        get_json(&self.client, &self.url("traefik-config"), self.basic_auth.as_ref()).await
    }

    pub async fn test_connection(&self) -> Result<()> {
        let _: serde_json::Value =
            get_json(&self.client, &self.url("resources"), self.basic_auth.as_ref()).await?;
        Ok(())
    }
}

fn router_from_resource(r: GatewayResource) -> UpstreamRouter {
    UpstreamRouter {
        id: r.resource_id,
        host: r.host,
        service_id: r.service_id,
        org_id: r.org_id,
        site_id: r.site_id,
        middlewares: r.middlewares,
    }
}
