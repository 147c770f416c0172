use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator-authored middleware override.
///
/// `config` is the opaque Traefik middleware body; `r#type` is the Traefik
/// middleware kind (`headers`, `rateLimit`, …) and drives per-type numeric
/// coercion at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Middleware {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_rename() {
        let mw: Middleware = serde_json::from_value(serde_json::json!({
            "id": "mw-1",
            "name": "rate-limit",
            "type": "rateLimit",
            "config": {"average": 100},
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(mw.kind, "rateLimit");
        let back = serde_json::to_value(&mw).unwrap();
        assert_eq!(back["type"], "rateLimit");
    }

    #[test]
    fn config_defaults_to_empty_object() {
        let mw: Middleware = serde_json::from_value(serde_json::json!({
            "id": "mw-1",
            "name": "n",
            "type": "headers",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(mw.config.as_object().unwrap().is_empty());
    }
}
