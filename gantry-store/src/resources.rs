//! Resource rows: discovered endpoints plus their override fields.
//!
//! Free functions take a connection so the reconciler can compose several
//! writes into one transaction; the [`Store`] methods are the single-shot
//! convenience surface used by request handlers.

use crate::Store;
use chrono::{DateTime, Utc};
use gantry_core::resource::{Resource, ResourceStatus};
use gantry_core::{GantryError, Result};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

fn from_row(row: &SqliteRow) -> sqlx::Result<Resource> {
    let status_raw: String = row.try_get("status")?;
    let status = ResourceStatus::parse(&status_raw)
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid status: {status_raw}").into()))?;
    Ok(Resource {
        id: row.try_get("id")?,
        host: row.try_get("host")?,
        service_id: row.try_get("service_id")?,
        org_id: row.try_get("org_id")?,
        site_id: row.try_get("site_id")?,
        status,
        entrypoints: row.try_get("entrypoints")?,
        tls_domains: row.try_get("tls_domains")?,
        tcp_enabled: row.try_get("tcp_enabled")?,
        tcp_entrypoints: row.try_get("tcp_entrypoints")?,
        tcp_sni_rule: row.try_get("tcp_sni_rule")?,
        custom_headers: row.try_get("custom_headers")?,
        router_priority: row.try_get("router_priority")?,
        mtls_override: row.try_get("mtls_override")?,
        source_type: row.try_get("source_type")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Resource>> {
    let rows = sqlx::query("SELECT * FROM resources ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    rows.iter().map(from_row).collect::<sqlx::Result<_>>().map_err(GantryError::store)
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<Resource>> {
    let row = sqlx::query("SELECT * FROM resources WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    row.as_ref().map(from_row).transpose().map_err(GantryError::store)
}

pub async fn insert(conn: &mut SqliteConnection, r: &Resource) -> Result<()> {
    sqlx::query(
        "INSERT INTO resources (id, host, service_id, org_id, site_id, status, entrypoints, \
         tls_domains, tcp_enabled, tcp_entrypoints, tcp_sni_rule, custom_headers, \
         router_priority, mtls_override, source_type, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )
    .bind(&r.id)
    .bind(&r.host)
    .bind(&r.service_id)
    .bind(&r.org_id)
    .bind(&r.site_id)
    .bind(r.status.as_str())
    .bind(&r.entrypoints)
    .bind(&r.tls_domains)
    .bind(r.tcp_enabled)
    .bind(&r.tcp_entrypoints)
    .bind(&r.tcp_sni_rule)
    .bind(&r.custom_headers)
    .bind(r.router_priority)
    .bind(&r.mtls_override)
    .bind(&r.source_type)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(())
}

/// Rewrite the upstream-derived fields only. Override fields are untouched.
pub async fn update_upstream_fields(
    conn: &mut SqliteConnection,
    id: &str,
    host: &str,
    service_id: &str,
    org_id: &str,
    site_id: &str,
    source_type: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE resources SET host = ?2, service_id = ?3, org_id = ?4, site_id = ?5, \
         source_type = ?6, updated_at = ?7 WHERE id = ?1",
    )
    .bind(id)
    .bind(host)
    .bind(service_id)
    .bind(org_id)
    .bind(site_id)
    .bind(source_type)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(())
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: ResourceStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE resources SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM resources WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(result.rows_affected() > 0)
}

/// Partial update of override fields. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone)]
pub struct ResourceOverridePatch {
    pub entrypoints: Option<String>,
    pub tls_domains: Option<String>,
    pub tcp_enabled: Option<bool>,
    pub tcp_entrypoints: Option<String>,
    pub tcp_sni_rule: Option<String>,
    pub custom_headers: Option<String>,
    pub router_priority: Option<i64>,
    pub mtls_override: Option<String>,
}

pub async fn update_overrides(
    conn: &mut SqliteConnection,
    id: &str,
    patch: &ResourceOverridePatch,
    now: DateTime<Utc>,
) -> Result<Resource> {
    let mut r = get(&mut *conn, id)
        .await?
        .ok_or_else(|| GantryError::not_found(format!("resource {id}")))?;

    if let Some(v) = &patch.entrypoints {
        r.entrypoints = v.clone();
    }
    if let Some(v) = &patch.tls_domains {
        r.tls_domains = v.clone();
    }
    if let Some(v) = patch.tcp_enabled {
        r.tcp_enabled = v;
    }
    if let Some(v) = &patch.tcp_entrypoints {
        r.tcp_entrypoints = v.clone();
    }
    if let Some(v) = &patch.tcp_sni_rule {
        r.tcp_sni_rule = v.clone();
    }
    if let Some(v) = &patch.custom_headers {
        r.custom_headers = v.clone();
    }
    if let Some(v) = patch.router_priority {
        if v < 0 {
            return Err(GantryError::validation("router_priority must be >= 0"));
        }
        r.router_priority = v;
    }
    if let Some(v) = &patch.mtls_override {
        r.mtls_override = v.clone();
    }
    r.updated_at = now;

    sqlx::query(
        "UPDATE resources SET entrypoints = ?2, tls_domains = ?3, tcp_enabled = ?4, \
         tcp_entrypoints = ?5, tcp_sni_rule = ?6, custom_headers = ?7, router_priority = ?8, \
         mtls_override = ?9, updated_at = ?10 WHERE id = ?1",
    )
    .bind(id)
    .bind(&r.entrypoints)
    .bind(&r.tls_domains)
    .bind(r.tcp_enabled)
    .bind(&r.tcp_entrypoints)
    .bind(&r.tcp_sni_rule)
    .bind(&r.custom_headers)
    .bind(r.router_priority)
    .bind(&r.mtls_override)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(r)
}

impl Store {
    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        all(&mut conn).await
    }

    pub async fn get_resource(&self, id: &str) -> Result<Resource> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        get(&mut conn, id)
            .await?
            .ok_or_else(|| GantryError::not_found(format!("resource {id}")))
    }

    pub async fn delete_resource(&self, id: &str) -> Result<()> {
        self.with_transaction(async |conn| {
            if delete(conn, id).await? {
                Ok(())
            } else {
                Err(GantryError::not_found(format!("resource {id}")))
            }
        })
        .await
    }

    pub async fn update_resource_overrides(
        &self,
        id: &str,
        patch: &ResourceOverridePatch,
    ) -> Result<Resource> {
        self.with_transaction(async |conn| update_overrides(conn, id, patch, Utc::now()).await)
            .await
    }
}
