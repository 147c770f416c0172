//! Operator-authored middleware records.

use crate::{Store, seed};
use chrono::{DateTime, Utc};
use gantry_core::middleware::Middleware;
use gantry_core::{GantryError, Result};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

fn from_row(row: &SqliteRow) -> sqlx::Result<Middleware> {
    let config_raw: String = row.try_get("config")?;
    let config = serde_json::from_str(&config_raw)
        .map_err(|e| sqlx::Error::Decode(format!("invalid middleware config: {e}").into()))?;
    Ok(Middleware {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: row.try_get("type")?,
        config,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Middleware>> {
    let rows = sqlx::query("SELECT * FROM middlewares ORDER BY name")
        .fetch_all(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    rows.iter().map(from_row).collect::<sqlx::Result<_>>().map_err(GantryError::store)
}

pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<Middleware>> {
    let row = sqlx::query("SELECT * FROM middlewares WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    row.as_ref().map(from_row).transpose().map_err(GantryError::store)
}

pub async fn name_taken(conn: &mut SqliteConnection, name: &str, exclude_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM middlewares WHERE name = ?1 AND id != ?2")
        .bind(name)
        .bind(exclude_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(row.is_some())
}

pub async fn insert(conn: &mut SqliteConnection, mw: &Middleware) -> Result<()> {
    sqlx::query(
        "INSERT INTO middlewares (id, name, type, config, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&mw.id)
    .bind(&mw.name)
    .bind(&mw.kind)
    .bind(mw.config.to_string())
    .bind(mw.created_at)
    .bind(mw.updated_at)
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
        "UPDATE middlewares SET name = ?2, type = ?3, config = ?4, updated_at = ?5 WHERE id = ?1",
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
        return Err(GantryError::not_found(format!("middleware {id}")));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM middlewares WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(result.rows_affected() > 0)
}

impl Store {
    pub async fn list_middlewares(&self) -> Result<Vec<Middleware>> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        all(&mut conn).await
    }

    pub async fn get_middleware(&self, id: &str) -> Result<Middleware> {
        let mut conn = self.pool().acquire().await.map_err(GantryError::store)?;
        get(&mut conn, id)
            .await?
            .ok_or_else(|| GantryError::not_found(format!("middleware {id}")))
    }

    pub async fn create_middleware(&self, mw: &Middleware) -> Result<()> {
        self.with_transaction(async |conn| {
            if name_taken(conn, &mw.name, &mw.id).await? {
                return Err(GantryError::Conflict(format!(
                    "middleware name already in use: {}",
                    mw.name
                )));
            }
            insert(conn, mw).await
        })
        .await
    }

    pub async fn update_middleware(
        &self,
        id: &str,
        name: &str,
        kind: &str,
        config: &serde_json::Value,
    ) -> Result<Middleware> {
        self.with_transaction(async |conn| {
            if name_taken(conn, name, id).await? {
                return Err(GantryError::Conflict(format!(
                    "middleware name already in use: {name}"
                )));
            }
            update(conn, id, name, kind, config, Utc::now()).await?;
            get(conn, id)
                .await?
                .ok_or_else(|| GantryError::not_found(format!("middleware {id}")))
        })
        .await
    }

    /// Delete a middleware. Built-in templates leave a tombstone so the
    /// seeder does not resurrect them on restart.
    pub async fn delete_middleware(&self, id: &str) -> Result<()> {
        self.with_transaction(async |conn| {
            if !delete(conn, id).await? {
                return Err(GantryError::not_found(format!("middleware {id}")));
            }
            if seed::is_template_middleware(id) {
                crate::settings::add_tombstone(conn, id, "middleware").await?;
            }
            Ok(())
        })
        .await
    }
}
