// ABOUTME: Keyed cache of live tenant connection pools with per-key create-once semantics
// ABOUTME: Concurrent first-access for one key builds exactly one pool; other keys never wait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

//! # Connection Pool Registry
//!
//! One live pool per tenant project, created lazily on first access and
//! reused afterwards. The registry is an explicit object with a controlled
//! lifecycle (`new`, `get_or_create`, `evict`, `shutdown`) and is injected
//! into request handling, never reached as ambient global state.
//!
//! Creation is serialized per key through a map of async once-cells: N
//! concurrent first-accesses for one unregistered key produce exactly one
//! underlying pool, while lookups and creations for unrelated keys proceed
//! independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::TenantPoolConfig;
use crate::errors::{AppError, AppResult};
use crate::tenant_db::TenantDatabase;

/// Registry of live tenant pools, keyed by project id
pub struct PoolRegistry {
    pools: DashMap<Uuid, Arc<OnceCell<Arc<TenantDatabase>>>>,
    config: TenantPoolConfig,
}

impl PoolRegistry {
    /// Create an empty registry with the given per-pool bounds
    #[must_use]
    pub fn new(config: TenantPoolConfig) -> Self {
        Self {
            pools: DashMap::new(),
            config,
        }
    }

    /// Return the pool registered under `key`, constructing and registering
    /// it from `connection_string` on first access.
    ///
    /// A failed construction leaves the cell empty, so a later call retries
    /// instead of caching the failure.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the pool cannot be constructed.
    pub async fn get_or_create(
        &self,
        key: Uuid,
        connection_string: &str,
    ) -> AppResult<Arc<TenantDatabase>> {
        loop {
            let cell = self
                .pools
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();

            let database = cell
                .get_or_try_init(|| async {
                    info!(project_id = %key, "creating tenant connection pool");
                    TenantDatabase::connect(connection_string, &self.config)
                        .await
                        .map(Arc::new)
                })
                .await
                .map(Arc::clone)?;

            // An eviction may have removed the entry while we were
            // connecting; a pool without a registry entry must not escape.
            let still_registered = self
                .pools
                .get(&key)
                .is_some_and(|entry| Arc::ptr_eq(entry.value(), &cell));
            if still_registered {
                debug!(project_id = %key, backend = database.backend_info(), "tenant pool checkout");
                return Ok(database);
            }
            database.close().await;
        }
    }

    /// Close the pool registered under `key` and remove the entry. A
    /// subsequent [`Self::get_or_create`] builds a fresh pool.
    ///
    /// If a first-access creation for `key` is in flight, eviction waits for
    /// it and closes the pool it produced, so no live pool outlasts its
    /// registry entry.
    pub async fn evict(&self, key: Uuid) {
        if let Some((_, cell)) = self.pools.remove(&key) {
            // The no-op initializer never runs a connect; it resolves an
            // in-flight creation or confirms the cell is empty.
            let pending = cell
                .get_or_try_init(|| async { Err(AppError::internal("cell not initialized")) })
                .await;
            if let Ok(database) = pending {
                database.close().await;
                info!(project_id = %key, "evicted tenant connection pool");
            }
        }
    }

    /// Close every registered pool and clear the registry
    pub async fn shutdown(&self) {
        let keys: Vec<Uuid> = self.pools.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            self.evict(key).await;
        }
        info!("pool registry shut down");
    }

    /// Number of registered entries (initialized or in-flight)
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// True when no pools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
