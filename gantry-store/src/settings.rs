//! Singleton configuration rows and template tombstones.

use crate::Store;
use chrono::Utc;
use gantry_core::relations::DeletedTemplate;
use gantry_core::settings::{MtlsConfig, SecurityConfig};
use gantry_core::{GantryError, Result};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

pub async fn get_mtls(conn: &mut SqliteConnection) -> Result<MtlsConfig> {
    let row = sqlx::query("SELECT enabled, config, updated_at FROM mtls_config WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;

    match row {
        Some(row) => {
            let config_raw: String = row.try_get("config").map_err(GantryError::store)?;
            Ok(MtlsConfig {
                id: 1,
                enabled: row.try_get("enabled").map_err(GantryError::store)?,
                config: serde_json::from_str(&config_raw)?,
                updated_at: row.try_get("updated_at").map_err(GantryError::store)?,
            })
        }
        None => Ok(MtlsConfig {
            id: 1,
            enabled: false,
            config: serde_json::json!({}),
            updated_at: Utc::now(),
        }),
    }
}

pub async fn put_mtls(
    conn: &mut SqliteConnection,
    enabled: bool,
    config: &serde_json::Value,
) -> Result<MtlsConfig> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO mtls_config (id, enabled, config, updated_at) VALUES (1, ?1, ?2, ?3) \
         ON CONFLICT (id) DO UPDATE SET enabled = excluded.enabled, \
         config = excluded.config, updated_at = excluded.updated_at",
    )
    .bind(enabled)
    .bind(config.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(MtlsConfig { id: 1, enabled, config: config.clone(), updated_at: now })
}

pub async fn get_security(conn: &mut SqliteConnection) -> Result<SecurityConfig> {
    let row = sqlx::query("SELECT config, updated_at FROM security_config WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;

    match row {
        Some(row) => {
            let config_raw: String = row.try_get("config").map_err(GantryError::store)?;
            Ok(SecurityConfig {
                id: 1,
                config: serde_json::from_str(&config_raw)?,
                updated_at: row.try_get("updated_at").map_err(GantryError::store)?,
            })
        }
        None => Ok(SecurityConfig { id: 1, config: serde_json::json!({}), updated_at: Utc::now() }),
    }
}

pub async fn put_security(
    conn: &mut SqliteConnection,
    config: &serde_json::Value,
) -> Result<SecurityConfig> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO security_config (id, config, updated_at) VALUES (1, ?1, ?2) \
         ON CONFLICT (id) DO UPDATE SET config = excluded.config, \
         updated_at = excluded.updated_at",
    )
    .bind(config.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(SecurityConfig { id: 1, config: config.clone(), updated_at: now })
}

pub async fn add_tombstone(conn: &mut SqliteConnection, id: &str, kind: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO deleted_templates (id, type) VALUES (?1, ?2)")
        .bind(id)
        .bind(kind)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(())
}

pub async fn has_tombstone(conn: &mut SqliteConnection, id: &str, kind: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM deleted_templates WHERE id = ?1 AND type = ?2")
        .bind(id)
        .bind(kind)
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(row.is_some())
}

pub async fn list_tombstones(conn: &mut SqliteConnection) -> Result<Vec<DeletedTemplate>> {
    let rows = sqlx::query("SELECT id, type FROM deleted_templates ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    rows.iter()
        .map(|row| {
            Ok(DeletedTemplate { id: row.try_get("id")?, kind: row.try_get("type")? })
        })
        .collect::<sqlx::Result<_>>()
        .map_err(GantryError::store)
}

impl Store {
    pub async fn get_mtls_config(&self) -> Result<MtlsConfig> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        get_mtls(&mut conn).await
    }

    pub async fn put_mtls_config(
        &self,
        enabled: bool,
        config: &serde_json::Value,
    ) -> Result<MtlsConfig> {
        self.with_transaction(async |conn| put_mtls(conn, enabled, config).await).await
    }

    pub async fn get_security_config(&self) -> Result<SecurityConfig> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        get_security(&mut conn).await
    }

    pub async fn put_security_config(&self, config: &serde_json::Value) -> Result<SecurityConfig> {
        self.with_transaction(async |conn| put_security(conn, config).await).await
    }
}
