//! Housekeeping sweeps: duplicate collapse and orphaned-relationship removal.
//!
//! Upstream providers hand out identifiers that differ only by provider
//! suffix (`svc@file` vs `svc`) or by cascaded `-auth` segments; over time the
//! store accumulates rows that canonicalize to the same entity. The sweep
//! collapses each group to a single winner and removes join rows whose
//! references dangle. Every phase runs under a timeout-bounded transaction so
//! a contended sweep aborts instead of holding the writer lock.

use crate::{Store, resources};
use chrono::Utc;
use gantry_core::normalize::{normalize, provider_suffix};
use gantry_core::resource::ResourceStatus;
use gantry_core::{GantryError, Result};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Reactivate the collapse winner when every row for a host is disabled.
    pub recover_corrupted: bool,
    /// Maximum rows deleted per statement.
    pub max_delete_batch: usize,
    /// Hard deadline per sweep transaction.
    pub deadline: Duration,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            recover_corrupted: false,
            max_delete_batch: 50,
            deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub services_removed: usize,
    pub resources_removed: usize,
    pub resources_reactivated: usize,
    pub orphans_removed: usize,
}

/// Serializes sweeps: a concurrent attempt fails fast instead of queueing.
pub struct CleanupManager {
    store: Store,
    opts: CleanupOptions,
    running: Arc<AtomicBool>,
}

impl CleanupManager {
    pub fn new(store: Store, opts: CleanupOptions) -> Self {
        Self { store, opts, running: Arc::new(AtomicBool::new(false)) }
    }

    /// Run one full sweep: duplicate services, duplicate resources, orphaned
    /// relationships. Each phase is its own timeout-bounded transaction.
    pub async fn sweep(&self) -> Result<CleanupReport> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GantryError::InProgress);
        }
        let result = self.run_phases().await;
        self.running.store(false, Ordering::SeqCst);
        match &result {
            Ok(report) => info!(
                services = report.services_removed,
                resources = report.resources_removed,
                reactivated = report.resources_reactivated,
                orphans = report.orphans_removed,
                "cleanup sweep finished"
            ),
            Err(e) => warn!(error = %e, "cleanup sweep aborted"),
        }
        result
    }

    async fn run_phases(&self) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        let batch = self.opts.max_delete_batch;
        let recover = self.opts.recover_corrupted;

        report.services_removed = self
            .store
            .with_timeout_transaction(self.opts.deadline, async |conn| {
                cleanup_duplicate_services(conn, batch).await
            })
            .await?;

        let (removed, reactivated) = self
            .store
            .with_timeout_transaction(self.opts.deadline, async |conn| {
                cleanup_duplicate_resources(conn, batch, recover).await
            })
            .await?;
        report.resources_removed = removed;
        report.resources_reactivated = reactivated;

        report.orphans_removed = self
            .store
            .with_timeout_transaction(self.opts.deadline, async |conn| {
                cleanup_orphaned_relationships(conn, batch).await
            })
            .await?;

        Ok(report)
    }
}

/// Pick the surviving identifier of a duplicate group. Strictly ordered:
/// a lone suffix-free id wins; otherwise `@file` beats every other suffix;
/// otherwise the shortest identifier (length, then bytes) wins.
fn pick_winner<'a>(ids: &[&'a str]) -> &'a str {
    let no_suffix: Vec<&str> = ids.iter().copied().filter(|id| !id.contains('@')).collect();
    if no_suffix.len() == 1 {
        return no_suffix[0];
    }

    let file: Vec<&str> = ids
        .iter()
        .copied()
        .filter(|id| provider_suffix(id) == Some("file"))
        .collect();
    let pool: &[&str] = if file.is_empty() { ids } else { &file };

    pool.iter()
        .copied()
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .expect("duplicate group is never empty")
}

/// Collapse service rows whose ids canonicalize to the same entity.
pub async fn cleanup_duplicate_services(
    conn: &mut SqliteConnection,
    batch: usize,
) -> Result<usize> {
    let ids = crate::services::all_ids(&mut *conn).await?;

    let mut groups: HashMap<String, Vec<&str>> = HashMap::new();
    for id in &ids {
        groups.entry(normalize(id)).or_default().push(id);
    }

    let mut losers: Vec<String> = Vec::new();
    for group in groups.values() {
        if group.len() < 2 {
            continue;
        }
        let winner = pick_winner(group);
        losers.extend(group.iter().copied().filter(|id| *id != winner).map(String::from));
    }

    delete_batched(&mut *conn, "services", "id", &losers, batch).await?;
    Ok(losers.len())
}

/// Collapse resource rows sharing a host. Among active rows, identifiers
/// matching `…-router-auth` are preferred; then the standard rule applies.
pub async fn cleanup_duplicate_resources(
    conn: &mut SqliteConnection,
    batch: usize,
    recover_corrupted: bool,
) -> Result<(usize, usize)> {
    let rows = resources::all(&mut *conn).await?;

    let mut by_host: HashMap<&str, Vec<&gantry_core::Resource>> = HashMap::new();
    for r in &rows {
        by_host.entry(r.host.as_str()).or_default().push(r);
    }

    let mut losers: Vec<String> = Vec::new();
    let mut reactivate: Vec<String> = Vec::new();
    for group in by_host.values() {
        if group.len() < 2 {
            continue;
        }

        let active: Vec<&gantry_core::Resource> =
            group.iter().copied().filter(|r| r.is_active()).collect();
        let auth_active: Vec<&gantry_core::Resource> = active
            .iter()
            .copied()
            .filter(|r| normalize(&r.id).ends_with("-router-auth"))
            .collect();

        let pool: &[&gantry_core::Resource] = if !auth_active.is_empty() {
            &auth_active
        } else if !active.is_empty() {
            &active
        } else {
            group
        };

        let pool_ids: Vec<&str> = pool.iter().map(|r| r.id.as_str()).collect();
        let winner = pick_winner(&pool_ids).to_string();

        if active.is_empty() && recover_corrupted {
            reactivate.push(winner.clone());
        }
        losers.extend(group.iter().filter(|r| r.id != winner).map(|r| r.id.clone()));
    }

    delete_batched(&mut *conn, "resources", "id", &losers, batch).await?;
    let now = Utc::now();
    for id in &reactivate {
        resources::set_status(&mut *conn, id, ResourceStatus::Active, now).await?;
    }
    Ok((losers.len(), reactivate.len()))
}

/// Remove join rows whose resource, middleware, or service reference is gone.
pub async fn cleanup_orphaned_relationships(
    conn: &mut SqliteConnection,
    batch: usize,
) -> Result<usize> {
    let mut removed = 0;

    let rowids = orphan_rowids(
        &mut *conn,
        "SELECT rowid FROM resource_middlewares \
         WHERE resource_id NOT IN (SELECT id FROM resources) \
         OR middleware_id NOT IN (SELECT id FROM middlewares)",
    )
    .await?;
    removed += delete_rowids_batched(&mut *conn, "resource_middlewares", &rowids, batch).await?;

    let rowids = orphan_rowids(
        &mut *conn,
        "SELECT rowid FROM resource_services \
         WHERE resource_id NOT IN (SELECT id FROM resources) \
         OR service_id NOT IN (SELECT id FROM services)",
    )
    .await?;
    removed += delete_rowids_batched(&mut *conn, "resource_services", &rowids, batch).await?;

    Ok(removed)
}

async fn orphan_rowids(conn: &mut SqliteConnection, query: &str) -> Result<Vec<i64>> {
    let rows = sqlx::query(query).fetch_all(&mut *conn).await.map_err(GantryError::store)?;
    rows.iter()
        .map(|r| r.try_get::<i64, _>(0))
        .collect::<sqlx::Result<_>>()
        .map_err(GantryError::store)
}

async fn delete_batched(
    conn: &mut SqliteConnection,
    table: &str,
    key: &str,
    ids: &[String],
    batch: usize,
) -> Result<()> {
    for chunk in ids.chunks(batch.max(1)) {
        let mut builder =
            sqlx::QueryBuilder::new(format!("DELETE FROM {table} WHERE {key} IN ("));
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
        builder.build().execute(&mut *conn).await.map_err(GantryError::store)?;
    }
    Ok(())
}

async fn delete_rowids_batched(
    conn: &mut SqliteConnection,
    table: &str,
    rowids: &[i64],
    batch: usize,
) -> Result<usize> {
    for chunk in rowids.chunks(batch.max(1)) {
        let mut builder = sqlx::QueryBuilder::new(format!("DELETE FROM {table} WHERE rowid IN ("));
        let mut separated = builder.separated(", ");
        for rowid in chunk {
            separated.push_bind(*rowid);
        }
        separated.push_unseparated(")");
        builder.build().execute(&mut *conn).await.map_err(GantryError::store)?;
    }
    Ok(rowids.len())
}
