use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service kinds Traefik accepts in a dynamic-config document.
pub const SERVICE_TYPES: [&str; 4] = ["loadBalancer", "weighted", "mirroring", "failover"];

/// Operator-authored service override. Assigned to a resource it replaces
/// the upstream-declared backing service in the served document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn valid_type(kind: &str) -> bool {
        SERVICE_TYPES.contains(&kind)
    }
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}
