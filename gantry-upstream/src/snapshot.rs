use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One router as reported by the upstream, before canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRouter {
    pub id: String,
    pub host: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub site_id: String,
    /// Middleware names the upstream already attaches to this router.
    #[serde(default)]
    pub middlewares: Vec<String>,
}

/// One backing service as reported by the upstream. The body is kept opaque
/// so unknown fields survive a round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamService {
    pub id: String,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// A complete upstream listing at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub routers: Vec<UpstreamRouter>,
    pub services: Vec<UpstreamService>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(routers: Vec<UpstreamRouter>, services: Vec<UpstreamService>) -> Self {
        Self { routers, services, fetched_at: Utc::now() }
    }
}
