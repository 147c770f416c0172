//! Short-TTL cache of the latest upstream snapshot.
//!
//! Fronts the adapter for the assembler only; the reconciler always calls
//! the adapter directly so a stale snapshot can never feed a tick.

use crate::{Snapshot, Upstream};
use gantry_core::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

pub struct SnapshotCache {
    ttl: Duration,
    entry: RwLock<Option<(Instant, Arc<Snapshot>)>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: RwLock::new(None) }
    }

    /// The cached snapshot, if still within its TTL.
    pub async fn get(&self) -> Option<Arc<Snapshot>> {
        let guard = self.entry.read().await;
        match guard.as_ref() {
            Some((at, snapshot)) if at.elapsed() < self.ttl => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    pub async fn put(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.entry.write().await = Some((Instant::now(), Arc::clone(&snapshot)));
        snapshot
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    /// Cached snapshot, or a fresh fetch from the adapter on miss.
    pub async fn get_or_fetch(&self, upstream: &Upstream) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.get().await {
            return Ok(snapshot);
        }
        debug!(adapter = upstream.describe(), "snapshot cache miss, fetching upstream");
        let snapshot = upstream.fetch_snapshot().await?;
        Ok(self.put(snapshot).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot() -> Snapshot {
        Snapshot::new(vec![], vec![])
    }

    #[tokio::test]
    async fn fresh_entry_is_served() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.put(empty_snapshot()).await;
        assert!(cache.get().await.is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = SnapshotCache::new(Duration::from_millis(10));
        cache.put(empty_snapshot()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn invalidate_clears_entry() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.put(empty_snapshot()).await;
        cache.invalidate().await;
        assert!(cache.get().await.is_none());
    }
}
