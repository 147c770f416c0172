//! Scheduled reconciliation of upstream state into the store.
//!
//! A single timer loop, not a pool. Each tick pulls a complete snapshot from
//! the active adapter, diffs it against the store, and commits the deltas in
//! one transaction; a tick that fails mid-commit has no partial effect.
//! Upstream and store failures log and retry on the next tick. Ticks never
//! overlap: a slow tick delays the next one.

use chrono::Utc;
use gantry_core::Result;
use gantry_core::normalize::normalize;
use gantry_core::resource::{
    DEFAULT_ENTRYPOINTS, DEFAULT_ROUTER_PRIORITY, Resource, ResourceStatus,
};
use gantry_store::cleanup::CleanupManager;
use gantry_store::{Store, resources};
use gantry_upstream::{Snapshot, UpstreamHandle, UpstreamRouter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What one tick changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub created: usize,
    pub reactivated: usize,
    pub updated: usize,
    pub disabled: usize,
}

pub struct Reconciler {
    store: Store,
    upstream: Arc<UpstreamHandle>,
    cleanup: Arc<CleanupManager>,
    poll_interval: Duration,
    cleanup_interval: Duration,
}

impl Reconciler {
    pub fn new(
        store: Store,
        upstream: Arc<UpstreamHandle>,
        cleanup: Arc<CleanupManager>,
        poll_interval: Duration,
        cleanup_interval: Duration,
    ) -> Self {
        Self { store, upstream, cleanup, poll_interval, cleanup_interval }
    }

    /// Run the loop until the shutdown signal flips. The current tick
    /// finishes before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_cleanup = tokio::time::Instant::now();

        info!(
            interval_secs = self.poll_interval.as_secs(),
            "reconciler started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) => {
                            if report != TickReport::default() {
                                info!(
                                    created = report.created,
                                    reactivated = report.reactivated,
                                    updated = report.updated,
                                    disabled = report.disabled,
                                    "reconciled upstream state"
                                );
                            }
                        }
                        Err(e) => warn!(error = %e, "reconcile tick failed, retrying next tick"),
                    }

                    if last_cleanup.elapsed() >= self.cleanup_interval {
                        last_cleanup = tokio::time::Instant::now();
                        if let Err(e) = self.cleanup.sweep().await {
                            warn!(error = %e, "cleanup sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("reconciler stopping");
                    break;
                }
            }
        }
    }

    /// One reconciliation pass. Bypasses the snapshot cache: a tick always
    /// sees fresh upstream state.
    pub async fn tick(&self) -> Result<TickReport> {
        let upstream = self.upstream.get();
        let snapshot = upstream.fetch_snapshot().await?;
        self.apply(&snapshot, upstream.describe()).await
    }

    /// Diff a snapshot against the store and commit the deltas in one
    /// transaction.
    pub async fn apply(&self, snapshot: &Snapshot, source: &str) -> Result<TickReport> {
        let mut upstream_by_id: HashMap<String, &UpstreamRouter> = HashMap::new();
        for router in &snapshot.routers {
            upstream_by_id.insert(normalize(&router.id), router);
        }

        self.store
            .with_transaction(async |conn| {
                let mut report = TickReport::default();
                let existing = resources::all(conn).await?;
                let existing_ids: HashMap<&str, &Resource> =
                    existing.iter().map(|r| (r.id.as_str(), r)).collect();
                let now = Utc::now();

                for (canonical, router) in &upstream_by_id {
                    match existing_ids.get(canonical.as_str()) {
                        None => {
                            resources::insert(conn, &discovered(canonical, router, source)).await?;
                            debug!(id = %canonical, "resource discovered");
                            report.created += 1;
                        }
                        Some(row) => {
                            if row.status == ResourceStatus::Disabled {
                                resources::set_status(conn, canonical, ResourceStatus::Active, now)
                                    .await?;
                                debug!(id = %canonical, "resource reappeared upstream");
                                report.reactivated += 1;
                            } else {
                                report.updated += 1;
                            }
                            resources::update_upstream_fields(
                                conn,
                                canonical,
                                &router.host,
                                &router.service_id,
                                &router.org_id,
                                &router.site_id,
                                source,
                                now,
                            )
                            .await?;
                        }
                    }
                }

                // rows from other sources are left untouched
                for row in &existing {
                    if row.source_type == source
                        && row.status == ResourceStatus::Active
                        && !upstream_by_id.contains_key(&row.id)
                    {
                        resources::set_status(conn, &row.id, ResourceStatus::Disabled, now).await?;
                        debug!(id = %row.id, "resource gone upstream, disabling");
                        report.disabled += 1;
                    }
                }

                Ok(report)
            })
            .await
    }
}

/// Fresh row for a first sighting: defaults plus upstream-derived fields.
fn discovered(canonical: &str, router: &UpstreamRouter, source: &str) -> Resource {
    let now = Utc::now();
    Resource {
        id: canonical.to_string(),
        host: router.host.clone(),
        service_id: router.service_id.clone(),
        org_id: router.org_id.clone(),
        site_id: router.site_id.clone(),
        status: ResourceStatus::Active,
        entrypoints: DEFAULT_ENTRYPOINTS.to_string(),
        tls_domains: String::new(),
        tcp_enabled: false,
        tcp_entrypoints: String::new(),
        tcp_sni_rule: String::new(),
        custom_headers: String::new(),
        router_priority: DEFAULT_ROUTER_PRIORITY,
        mtls_override: String::new(),
        source_type: source.to_string(),
        created_at: now,
        updated_at: now,
    }
}
