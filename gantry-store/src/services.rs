//! Operator-authored service overrides.

use crate::{Store, seed};
use chrono::{DateTime, Utc};
use gantry_core::service::Service;
use gantry_core::{GantryError, Result};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

fn from_row(row: &SqliteRow) -> sqlx::Result<Service> {
    let config_raw: String = row.try_get("config")?;
    let config = serde_json::from_str(&config_raw)
        .map_err(|e| sqlx::Error::Decode(format!("invalid service config: {e}").into()))?;
    Ok(Service {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: row.try_get("type")?,
        config,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Service>> {
    let rows = sqlx::query("SELECT * FROM services ORDER BY name")
        .fetch_all(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    rows.iter().map(from_row).collect::<sqlx::Result<_>>().map_err(GantryError::store)
}

/// Id column only. The duplicate sweep groups these without materializing
/// full rows.
pub async fn all_ids(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT id FROM services ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    rows.iter()
        .map(|r| r.try_get("id"))
        .collect::<sqlx::Result<_>>()
        .map_err(GantryError::store)
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<Service>> {
    let row = sqlx::query("SELECT * FROM services WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    row.as_ref().map(from_row).transpose().map_err(GantryError::store)
}

pub async fn name_taken(conn: &mut SqliteConnection, name: &str, exclude_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM services WHERE name = ?1 AND id != ?2")
        .bind(name)
        .bind(exclude_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(row.is_some())
}

pub async fn insert(conn: &mut SqliteConnection, svc: &Service) -> Result<()> {
    sqlx::query(
        "INSERT INTO services (id, name, type, config, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&svc.id)
    .bind(&svc.name)
    .bind(&svc.kind)
    .bind(svc.config.to_string())
    .bind(svc.created_at)
    .bind(svc.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(())
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: &str,
    name: &str,
    kind: &str,
    config: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE services SET name = ?2, type = ?3, config = ?4, updated_at = ?5 WHERE id = ?1",
    )
    .bind(id)
    .bind(name)
    .bind(kind)
    .bind(config.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    if result.rows_affected() == 0 {
        return Err(GantryError::not_found(format!("service {id}")));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM services WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(result.rows_affected() > 0)
}

impl Store {
    pub async fn list_services(&self) -> Result<Vec<Service>> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        all(&mut conn).await
    }

    pub async fn get_service(&self, id: &str) -> Result<Service> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        get(&mut conn, id)
            .await?
            .ok_or_else(|| GantryError::not_found(format!("service {id}")))
    }

    pub async fn create_service(&self, svc: &Service) -> Result<()> {
        if !Service::valid_type(&svc.kind) {
            return Err(GantryError::validation(format!(
                "invalid service type: {}",
                svc.kind
            )));
        }
        self.with_transaction(async |conn| {
            if name_taken(conn, &svc.name, &svc.id).await? {
                return Err(GantryError::Conflict(format!(
                    "service name already in use: {}",
                    svc.name
                )));
            }
            insert(conn, svc).await
        })
        .await
    }

    pub async fn update_service(
        &self,
        id: &str,
        name: &str,
        kind: &str,
        config: &serde_json::Value,
    ) -> Result<Service> {
        if !Service::valid_type(kind) {
            return Err(GantryError::validation(format!("invalid service type: {kind}")));
        }
        self.with_transaction(async |conn| {
            if name_taken(conn, name, id).await? {
                return Err(GantryError::Conflict(format!(
                    "service name already in use: {name}"
                )));
            }
            update(conn, id, name, kind, config, Utc::now()).await?;
            get(conn, id)
                .await?
                .ok_or_else(|| GantryError::not_found(format!("service {id}")))
        })
        .await
    }

    pub async fn delete_service(&self, id: &str) -> Result<()> {
        self.with_transaction(async |conn| {
            if !delete(conn, id).await? {
                return Err(GantryError::not_found(format!("service {id}")));
            }
            if seed::is_template_service(id) {
                crate::settings::add_tombstone(conn, id, "service").await?;
            }
            Ok(())
        })
        .await
    }
}
