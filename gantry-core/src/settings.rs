use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global mTLS configuration. A single database row pinned to `id = 1`;
/// treated as an ordinary row with a uniqueness constraint, not a process
/// global. `config` is the opaque Traefik `clientAuth` options blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtlsConfig {
    #[serde(default = "singleton_id")]
    pub id: i64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Global security configuration singleton, same shape discipline as
/// [`MtlsConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "singleton_id")]
    pub id: i64,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Name the served document uses for the TLS options entry synthesized from
/// the mTLS singleton.
pub const MTLS_OPTIONS_NAME: &str = "gantry-mtls";

fn singleton_id() -> i64 {
    1
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}
