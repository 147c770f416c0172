use serde::{Deserialize, Serialize};

/// Ordered resource↔middleware assignment. Lower priority is applied first;
/// priority breaks ties in chain order. Composite key
/// `(resource_id, middleware_id)`, cascade on delete from either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMiddleware {
    pub resource_id: String,
    pub middleware_id: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

/// Resource↔service assignment. Keyed as M:N for historical reasons but
/// logically at most one row per resource; assignment replaces any prior row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceService {
    pub resource_id: String,
    pub service_id: String,
}

/// Tombstone that keeps a deleted built-in template from being re-seeded
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedTemplate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn default_priority() -> i64 {
    100
}
