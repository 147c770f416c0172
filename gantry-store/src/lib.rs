//! SQLite-backed local store.
//!
//! Upstream is the source of truth for resource existence; this store is the
//! source of truth for operator overrides. All writes go through short
//! transactions; housekeeping runs under a timeout-bounded transaction so a
//! wedged sweep can never hold the writer lock indefinitely.

pub mod cleanup;
pub mod middlewares;
pub mod relations;
pub mod resources;
pub mod seed;
pub mod services;
pub mod settings;

use gantry_core::{GantryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Handle to the SQLite database. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file and apply migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(GantryError::store)?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// In-memory database for tests. Pinned to a single connection so the
    /// database outlives individual acquires.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(GantryError::store)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(GantryError::store)?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply forward-only migrations. Fatal at startup if this fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(GantryError::store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `f` inside a write transaction. Commits if `f` succeeds, rolls
    /// back otherwise; any inner error is surfaced verbatim inside the
    /// aborted-transaction error.
    pub async fn with_transaction<T>(
        &self,
        f: impl AsyncFnOnce(&mut SqliteConnection) -> Result<T>,
    ) -> Result<T> {
        let mut tx = self.pool.begin().await.map_err(GantryError::store)?;
        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await.map_err(GantryError::store)?;
                Ok(value)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(GantryError::Aborted(Box::new(e)))
            }
        }
    }

    /// Like [`with_transaction`](Self::with_transaction), but the transaction
    /// is abandoned once `deadline` elapses. Used by housekeeping that must
    /// not wedge the database under lock contention.
    pub async fn with_timeout_transaction<T>(
        &self,
        deadline: Duration,
        f: impl AsyncFnOnce(&mut SqliteConnection) -> Result<T>,
    ) -> Result<T> {
        let mut tx = self.pool.begin().await.map_err(GantryError::store)?;
        match tokio::time::timeout(deadline, f(&mut *tx)).await {
            Err(_elapsed) => {
                drop(tx);
                Err(GantryError::Timeout(deadline))
            }
            Ok(Ok(value)) => {
                tx.commit().await.map_err(GantryError::store)?;
                Ok(value)
            }
            Ok(Err(e)) => {
                let _ = tx.rollback().await;
                Err(GantryError::Aborted(Box::new(e)))
            }
        }
    }
}
