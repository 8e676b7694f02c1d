// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Host Capacity Extractor
//!
//! Aggregates the hypervisor inventory cache into per-host residual
//! capacity: how much memory, vCPU, and local disk each host has left.
//! The binpacking weigher is the primary consumer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;

use cortex_domain::events::topics;
use cortex_domain::repositories::FeatureRecord;
use cortex_domain::services::FeatureExtractor;
use cortex_domain::SchedulerError;

use crate::infrastructure::repositories::SqliteFeatureStore;

/// Knowledge-updated topic of this extractor.
pub const TOPIC: &str = "cortex/features/host_capacity";

/// Residual capacity of one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCapacityFeature {
    pub host: String,
    pub total_memory_mb: i64,
    pub memory_free_mb: i64,
    pub total_vcpus: i64,
    pub vcpus_free: i64,
    pub total_disk_gb: i64,
    pub disk_free_gb: i64,
}

impl FeatureRecord for HostCapacityFeature {
    const TABLE: &'static str = "feature_host_capacity";

    fn schema() -> &'static str {
        "CREATE TABLE IF NOT EXISTS feature_host_capacity (
            host TEXT PRIMARY KEY,
            total_memory_mb INTEGER NOT NULL,
            memory_free_mb INTEGER NOT NULL,
            total_vcpus INTEGER NOT NULL,
            vcpus_free INTEGER NOT NULL,
            total_disk_gb INTEGER NOT NULL,
            disk_free_gb INTEGER NOT NULL
        )"
    }
}

/// Recomputes [`HostCapacityFeature`] from the hypervisor cache.
pub struct HostCapacityExtractor {
    store: Arc<SqliteFeatureStore>,
}

impl HostCapacityExtractor {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeatureExtractor for HostCapacityExtractor {
    fn name(&self) -> &'static str {
        "host_capacity"
    }

    fn table(&self) -> &'static str {
        HostCapacityFeature::TABLE
    }

    fn triggers(&self) -> &'static [&'static str] {
        &[topics::SYNC_HYPERVISORS]
    }

    fn publishes(&self) -> &'static str {
        TOPIC
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.register::<HostCapacityFeature>().await
    }

    async fn run(&self) -> Result<u64, SchedulerError> {
        let rows = sqlx::query(
            "SELECT service_host, memory_mb, memory_used_mb, vcpus, vcpus_used, \
                    local_disk_gb, local_disk_used_gb \
             FROM cache_hypervisors",
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(|e| SchedulerError::extractor_error(format!("host_capacity: failed to read cache: {}", e)))?;

        let features: Vec<HostCapacityFeature> = rows
            .into_iter()
            .map(|row| {
                let memory_mb: i64 = row.get("memory_mb");
                let vcpus: i64 = row.get("vcpus");
                let disk_gb: i64 = row.get("local_disk_gb");
                HostCapacityFeature {
                    host: row.get("service_host"),
                    total_memory_mb: memory_mb,
                    memory_free_mb: memory_mb - row.get::<i64, _>("memory_used_mb"),
                    total_vcpus: vcpus,
                    vcpus_free: vcpus - row.get::<i64, _>("vcpus_used"),
                    total_disk_gb: disk_gb,
                    disk_free_gb: disk_gb - row.get::<i64, _>("local_disk_used_gb"),
                }
            })
            .collect();

        self.store.replace_all(&features).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema;
    use cortex_domain::repositories::KnowledgeStoreExt;

    #[tokio::test]
    async fn test_residuals_computed_from_inventory() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        schema::ensure_schema(store.pool()).await.unwrap();
        sqlx::query(
            "INSERT INTO cache_hypervisors (service_host, hypervisor_hostname, state, memory_mb, \
             memory_used_mb, vcpus, vcpus_used, local_disk_gb, local_disk_used_gb) \
             VALUES ('h1', 'node1', 'up', 2048, 1024, 4, 1, 200, 50)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let extractor = HostCapacityExtractor::new(store.clone());
        extractor.init().await.unwrap();
        assert_eq!(extractor.run().await.unwrap(), 1);

        let features: Vec<HostCapacityFeature> = store.fetch().await.unwrap();
        assert_eq!(features[0].memory_free_mb, 1024);
        assert_eq!(features[0].vcpus_free, 3);
        assert_eq!(features[0].disk_free_gb, 150);
    }
}
