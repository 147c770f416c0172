//! Built-in template records seeded at first startup.
//!
//! Seeding skips any template whose `(id, type)` has a tombstone in
//! `deleted_templates`, so an operator's delete sticks across restarts.

use crate::{Store, middlewares, settings};
use chrono::Utc;
use gantry_core::Result;
use gantry_core::middleware::Middleware;
use tracing::info;

pub const TEMPLATE_SECURITY_HEADERS: &str = "default-security-headers";
pub const TEMPLATE_RATE_LIMIT: &str = "default-rate-limit";

pub fn is_template_middleware(id: &str) -> bool {
    id == TEMPLATE_SECURITY_HEADERS || id == TEMPLATE_RATE_LIMIT
}

pub fn is_template_service(_id: &str) -> bool {
    // no built-in service templates today
    false
}

fn templates() -> Vec<Middleware> {
    let now = Utc::now();
    vec![
        Middleware {
            id: TEMPLATE_SECURITY_HEADERS.to_string(),
            name: "Security Headers".to_string(),
            kind: "headers".to_string(),
            config: serde_json::json!({
                "stsSeconds": 31536000,
                "stsIncludeSubdomains": true,
                "browserXssFilter": true,
                "contentTypeNosniff": true,
                "frameDeny": true,
            }),
            created_at: now,
            updated_at: now,
        },
        Middleware {
            id: TEMPLATE_RATE_LIMIT.to_string(),
            name: "Rate Limit".to_string(),
            kind: "rateLimit".to_string(),
            config: serde_json::json!({
                "average": 100,
                "burst": 50,
            }),
            created_at: now,
            updated_at: now,
        },
    ]
}

impl Store {
    /// Insert missing built-in templates, honoring tombstones.
    pub async fn seed_templates(&self) -> Result<usize> {
        self.with_transaction(async |conn| {
            let mut seeded = 0;
            for template in templates() {
                if settings::has_tombstone(conn, &template.id, "middleware").await? {
                    continue;
                }
                if middlewares::get(conn, &template.id).await?.is_some() {
                    continue;
                }
                middlewares::insert(conn, &template).await?;
                info!(id = %template.id, "seeded template middleware");
                seeded += 1;
            }
            Ok(seeded)
        })
        .await
    }
}
