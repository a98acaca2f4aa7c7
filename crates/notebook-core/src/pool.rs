//! Lazy, DSN-keyed pooled connections to the relational backend.
//!
//! Implemented over `sqlx::AnyPool` (one pooled connection set per DSN,
//! kept driver-agnostic via `sqlx`'s `Any` backend rather than
//! hard-coding a single relational driver). The scheduler already serializes
//! the run in which pools are touched, but `test()` can race a run, hence the
//! `RwLock`.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::AnyPool;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Pool size is a compile-time constant, within spec's 1-10 range.
const POOL_MAX_CONNECTIONS: u32 = 5;

/// The outcome of a liveness check against a DSN.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionTest {
    pub ok: bool,
    pub message: String,
}

/// Lazily creates and caches one `AnyPool` per DSN.
#[derive(Default)]
pub struct PoolManager {
    pools: RwLock<HashMap<String, AnyPool>>,
}

impl PoolManager {
    pub fn new() -> Arc<Self> {
        install_default_drivers();
        Arc::new(Self::default())
    }

    pub async fn get_pool(&self, dsn: &str) -> Result<AnyPool> {
        if let Some(pool) = self.pools.read().await.get(dsn) {
            return Ok(pool.clone());
        }
        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(dsn) {
            return Ok(pool.clone());
        }
        let pool = AnyPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .connect(dsn)
            .await
            .map_err(|e| Error::QueryExecutionError(e.to_string()))?;
        pools.insert(dsn.to_string(), pool.clone());
        Ok(pool)
    }

    /// Opens a connection and issues `SELECT 1`, reporting any error instead
    /// of propagating it.
    pub async fn test(&self, dsn: &str) -> ConnectionTest {
        match self.get_pool(dsn).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => ConnectionTest { ok: true, message: "connection ok".to_string() },
                Err(e) => ConnectionTest { ok: false, message: e.to_string() },
            },
            Err(e) => ConnectionTest { ok: false, message: e.to_string() },
        }
    }

    /// Closes and drops the pool for a DSN, e.g. on settings change or shutdown.
    pub async fn invalidate(&self, dsn: &str) {
        let pool = self.pools.write().await.remove(dsn);
        if let Some(pool) = pool {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_failure_without_panicking() {
        let manager = PoolManager::new();
        let result = manager.test("postgres://nonexistent-host-for-tests/db").await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn invalidate_on_unknown_dsn_is_a_no_op() {
        let manager = PoolManager::new();
        manager.invalidate("sqlite::memory:").await;
    }
}
