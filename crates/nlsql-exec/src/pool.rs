//! Per-backend connection pool lifecycle.
//!
//! One `AnyPool` per backend, created lazily on first use and cached for the
//! life of the process — mirroring the registry's "connections owned by the
//! backend, not by callers" rule (§4.1).

use std::sync::Arc;

use dashmap::DashMap;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::error::ExecutionError;

pub struct PoolManager {
    pools: DashMap<String, Arc<AnyPool>>,
    max_connections: u32,
}

impl PoolManager {
    pub fn new(max_connections: u32) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            pools: DashMap::new(),
            max_connections,
        }
    }

    pub async fn get_or_connect(
        &self,
        backend_id: &str,
        connection_descriptor: &str,
    ) -> Result<Arc<AnyPool>, ExecutionError> {
        if let Some(pool) = self.pools.get(backend_id) {
            return Ok(pool.clone());
        }

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(connection_descriptor)
            .await
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;

        let pool = Arc::new(pool);
        self.pools.insert(backend_id.to_string(), pool.clone());
        Ok(pool)
    }

    pub fn drop_pool(&self, backend_id: &str) {
        self.pools.remove(backend_id);
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new(10)
    }
}
