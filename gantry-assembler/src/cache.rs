//! Whole-document cache for the assembled config.
//!
//! A single entry keyed by nothing: there is one active config. The TTL caps
//! staleness below typical proxy poll intervals; admin mutations evict
//! explicitly. A minute-resolution janitor drops expired entries so an idle
//! instance does not pin a stale document in memory.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, watch};
use tracing::debug;

struct CacheEntry {
    value: Arc<Value>,
    built_at: Instant,
}

pub struct ConfigCache {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    last_build: RwLock<Option<DateTime<Utc>>>,
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: RwLock::new(None), last_build: RwLock::new(None) }
    }

    pub async fn get(&self) -> Option<Arc<Value>> {
        let guard = self.entry.read().await;
        match guard.as_ref() {
            Some(entry) if entry.built_at.elapsed() < self.ttl => Some(Arc::clone(&entry.value)),
            _ => None,
        }
    }

    pub async fn put(&self, value: Value) -> Arc<Value> {
        let value = Arc::new(value);
        let now = Utc::now();
        *self.entry.write().await =
            Some(CacheEntry { value: Arc::clone(&value), built_at: Instant::now() });
        *self.last_build.write().await = Some(now);
        value
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    /// Age of the current entry, if one is cached and fresh.
    pub async fn age(&self) -> Option<Duration> {
        let guard = self.entry.read().await;
        guard.as_ref().map(|entry| entry.built_at.elapsed()).filter(|age| *age < self.ttl)
    }

    /// Wall-clock time of the most recent build. Survives eviction.
    pub async fn last_build_time(&self) -> Option<DateTime<Utc>> {
        *self.last_build.read().await
    }

    pub async fn purge_expired(&self) {
        let mut guard = self.entry.write().await;
        if let Some(entry) = guard.as_ref()
            && entry.built_at.elapsed() >= self.ttl
        {
            debug!("purging expired config cache entry");
            *guard = None;
        }
    }
}

/// Minute-resolution janitor dropping expired entries. Exits on shutdown.
pub fn spawn_janitor(
    cache: Arc<ConfigCache>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => cache.purge_expired().await,
                _ = shutdown.changed() => break,
            }
        }
    })
}
