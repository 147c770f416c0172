//! Join rows between resources and their override middlewares/services.
//!
//! Relationships are plain rows owned by the store; the entities on either
//! side never hold pointers to each other in memory. Cascades clean these up
//! when either side is deleted; the orphan sweep restores the invariant when
//! a cascade was bypassed.

use crate::Store;
use gantry_core::middleware::Middleware;
use gantry_core::relations::{ResourceMiddleware, ResourceService};
use gantry_core::service::Service;
use gantry_core::{GantryError, Result};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

pub async fn assign_middleware(
    conn: &mut SqliteConnection,
    resource_id: &str,
    middleware_id: &str,
    priority: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO resource_middlewares (resource_id, middleware_id, priority) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT (resource_id, middleware_id) DO UPDATE SET priority = excluded.priority",
    )
    .bind(resource_id)
    .bind(middleware_id)
    .bind(priority)
    .execute(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    Ok(())
}

pub async fn remove_middleware(
    conn: &mut SqliteConnection,
    resource_id: &str,
    middleware_id: &str,
) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM resource_middlewares WHERE resource_id = ?1 AND middleware_id = ?2")
            .bind(resource_id)
            .bind(middleware_id)
            .execute(&mut *conn)
            .await
            .map_err(GantryError::store)?;
    Ok(result.rows_affected() > 0)
}

/// Assigned middlewares in chain order: priority ascending, id as the final
/// tie-breaker so output is stable.
pub async fn middlewares_for_resource(
    conn: &mut SqliteConnection,
    resource_id: &str,
) -> Result<Vec<Middleware>> {
    let rows = sqlx::query(
        "SELECT m.* FROM middlewares m \
         JOIN resource_middlewares rm ON rm.middleware_id = m.id \
         WHERE rm.resource_id = ?1 \
         ORDER BY rm.priority ASC, m.id ASC",
    )
    .bind(resource_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(GantryError::store)?;

    rows.iter()
        .map(|row| {
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
        })
        .collect::<sqlx::Result<_>>()
        .map_err(GantryError::store)
}

pub async fn all_assignments(conn: &mut SqliteConnection) -> Result<Vec<ResourceMiddleware>> {
    let rows = sqlx::query(
        "SELECT resource_id, middleware_id, priority FROM resource_middlewares \
         ORDER BY resource_id, priority, middleware_id",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    rows.iter()
        .map(|row| {
            Ok(ResourceMiddleware {
                resource_id: row.try_get("resource_id")?,
                middleware_id: row.try_get("middleware_id")?,
                priority: row.try_get("priority")?,
            })
        })
        .collect::<sqlx::Result<_>>()
        .map_err(GantryError::store)
}

pub async fn all_service_assignments(conn: &mut SqliteConnection) -> Result<Vec<ResourceService>> {
    let rows = sqlx::query(
        "SELECT resource_id, service_id FROM resource_services ORDER BY resource_id, service_id",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(GantryError::store)?;
    rows.iter()
        .map(|row| {
            Ok(ResourceService {
                resource_id: row.try_get("resource_id")?,
                service_id: row.try_get("service_id")?,
            })
        })
        .collect::<sqlx::Result<_>>()
        .map_err(GantryError::store)
}

/// Replace the resource's service assignment. At most one row per resource.
pub async fn assign_service(
    conn: &mut SqliteConnection,
    resource_id: &str,
    service_id: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM resource_services WHERE resource_id = ?1")
        .bind(resource_id)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    sqlx::query("INSERT INTO resource_services (resource_id, service_id) VALUES (?1, ?2)")
        .bind(resource_id)
        .bind(service_id)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(())
}

pub async fn clear_service(conn: &mut SqliteConnection, resource_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM resource_services WHERE resource_id = ?1")
        .bind(resource_id)
        .execute(&mut *conn)
        .await
        .map_err(GantryError::store)?;
    Ok(result.rows_affected() > 0)
}

pub async fn service_for_resource(
    conn: &mut SqliteConnection,
    resource_id: &str,
) -> Result<Option<Service>> {
    let row = sqlx::query(
        "SELECT s.* FROM services s \
         JOIN resource_services rs ON rs.service_id = s.id \
         WHERE rs.resource_id = ?1 \
         ORDER BY s.id LIMIT 1",
    )
    .bind(resource_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(GantryError::store)?;

    row.map(|row| {
        let config_raw: String = row.try_get("config")?;
        let config = serde_json::from_str(&config_raw)
            .map_err(|e| sqlx::Error::Decode(format!("invalid service config: {e}").into()))?;
        Ok::<Service, sqlx::Error>(Service {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            kind: row.try_get("type")?,
            config,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    })
    .transpose()
    .map_err(GantryError::store)
}

impl Store {
    pub async fn assign_middleware(
        &self,
        resource_id: &str,
        middleware_id: &str,
        priority: i64,
    ) -> Result<()> {
        self.with_transaction(async |conn| {
            if crate::resources::get(conn, resource_id).await?.is_none() {
                return Err(GantryError::not_found(format!("resource {resource_id}")));
            }
            if crate::middlewares::get(conn, middleware_id).await?.is_none() {
                return Err(GantryError::not_found(format!("middleware {middleware_id}")));
            }
            assign_middleware(conn, resource_id, middleware_id, priority).await
        })
        .await
    }

    pub async fn remove_middleware_assignment(
        &self,
        resource_id: &str,
        middleware_id: &str,
    ) -> Result<()> {
        self.with_transaction(async |conn| {
            if !remove_middleware(conn, resource_id, middleware_id).await? {
                return Err(GantryError::not_found(format!(
                    "assignment {resource_id}/{middleware_id}"
                )));
            }
            Ok(())
        })
        .await
    }

    pub async fn assign_service(&self, resource_id: &str, service_id: &str) -> Result<()> {
        self.with_transaction(async |conn| {
            if crate::resources::get(conn, resource_id).await?.is_none() {
                return Err(GantryError::not_found(format!("resource {resource_id}")));
            }
            if crate::services::get(conn, service_id).await?.is_none() {
                return Err(GantryError::not_found(format!("service {service_id}")));
            }
            assign_service(conn, resource_id, service_id).await
        })
        .await
    }

    pub async fn clear_service_assignment(&self, resource_id: &str) -> Result<()> {
        self.with_transaction(async |conn| {
            if !clear_service(conn, resource_id).await? {
                return Err(GantryError::not_found(format!(
                    "service assignment for {resource_id}"
                )));
            }
            Ok(())
        })
        .await
    }
}
