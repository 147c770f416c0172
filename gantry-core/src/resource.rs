use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle flag for a discovered resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Active,
    Disabled,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "active",
            ResourceStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ResourceStatus::Active),
            "disabled" => Some(ResourceStatus::Disabled),
            _ => None,
        }
    }
}

/// One routable endpoint discovered upstream, plus its operator overrides.
///
/// `id` holds the canonical (normalized) identifier and is the primary key.
/// Fields derived from upstream (`host`, `service_id`, `org_id`, `site_id`)
/// are rewritten on every reconciler tick; the rest are override fields owned
/// by the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub host: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default = "default_status")]
    pub status: ResourceStatus,

    /// Comma-joined HTTP listener names.
    #[serde(default = "default_entrypoints")]
    pub entrypoints: String,
    /// Comma-joined SAN list. Empty means no TLS section.
    #[serde(default)]
    pub tls_domains: String,

    #[serde(default)]
    pub tcp_enabled: bool,
    #[serde(default)]
    pub tcp_entrypoints: String,
    #[serde(default)]
    pub tcp_sni_rule: String,

    /// Opaque serialized header map; attached as a synthesized middleware.
    #[serde(default)]
    pub custom_headers: String,
    #[serde(default = "default_router_priority")]
    pub router_priority: i64,
    /// Opaque per-resource mTLS override blob.
    #[serde(default)]
    pub mtls_override: String,

    /// Which upstream adapter produced this row. Informational.
    #[serde(default)]
    pub source_type: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn is_active(&self) -> bool {
        self.status == ResourceStatus::Active
    }

    /// Entrypoint names, comma-split and trimmed.
    pub fn entrypoint_list(&self) -> Vec<&str> {
        split_csv(&self.entrypoints)
    }

    /// TCP entrypoints; falls back to the HTTP set when unset.
    pub fn tcp_entrypoint_list(&self) -> Vec<&str> {
        let tcp = split_csv(&self.tcp_entrypoints);
        if tcp.is_empty() { self.entrypoint_list() } else { tcp }
    }

    pub fn tls_domain_list(&self) -> Vec<&str> {
        split_csv(&self.tls_domains)
    }
}

fn split_csv(s: &str) -> Vec<&str> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect()
}

pub const DEFAULT_ENTRYPOINTS: &str = "websecure";
pub const DEFAULT_ROUTER_PRIORITY: i64 = 100;

fn default_status() -> ResourceStatus {
    ResourceStatus::Active
}

fn default_entrypoints() -> String {
    DEFAULT_ENTRYPOINTS.to_string()
}

fn default_router_priority() -> i64 {
    DEFAULT_ROUTER_PRIORITY
}
