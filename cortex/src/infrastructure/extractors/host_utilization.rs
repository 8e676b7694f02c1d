// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Host Utilization Extractor
//!
//! Pivots the telemetry cache into one row per host with average and
//! maximum CPU and memory utilization. Consumed by the
//! avoid-overloaded-host weighers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;

use cortex_domain::events::topics;
use cortex_domain::repositories::FeatureRecord;
use cortex_domain::services::FeatureExtractor;
use cortex_domain::SchedulerError;

use crate::infrastructure::repositories::SqliteFeatureStore;

/// Knowledge-updated topic of this extractor.
pub const TOPIC: &str = "cortex/features/host_utilization";

/// Telemetry-derived utilization of one host, in percent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostUtilizationFeature {
    pub host: String,
    pub avg_cpu_percent: f64,
    pub max_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub max_memory_percent: f64,
}

impl FeatureRecord for HostUtilizationFeature {
    const TABLE: &'static str = "feature_host_utilization";

    fn schema() -> &'static str {
        "CREATE TABLE IF NOT EXISTS feature_host_utilization (
            host TEXT PRIMARY KEY,
            avg_cpu_percent REAL NOT NULL,
            max_cpu_percent REAL NOT NULL,
            avg_memory_percent REAL NOT NULL,
            max_memory_percent REAL NOT NULL
        )"
    }
}

/// Recomputes [`HostUtilizationFeature`] from the telemetry cache.
pub struct HostUtilizationExtractor {
    store: Arc<SqliteFeatureStore>,
}

impl HostUtilizationExtractor {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeatureExtractor for HostUtilizationExtractor {
    fn name(&self) -> &'static str {
        "host_utilization"
    }

    fn table(&self) -> &'static str {
        HostUtilizationFeature::TABLE
    }

    fn triggers(&self) -> &'static [&'static str] {
        &[topics::SYNC_TELEMETRY]
    }

    fn publishes(&self) -> &'static str {
        TOPIC
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.register::<HostUtilizationFeature>().await
    }

    async fn run(&self) -> Result<u64, SchedulerError> {
        let rows = sqlx::query(
            "SELECT host, metric, avg, max FROM cache_telemetry \
             WHERE metric IN ('cpu_percent', 'memory_percent')",
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(|e| SchedulerError::extractor_error(format!("host_utilization: failed to read cache: {}", e)))?;

        let mut per_host: BTreeMap<String, HostUtilizationFeature> = BTreeMap::new();
        for row in rows {
            let host: String = row.get("host");
            let metric: String = row.get("metric");
            let entry = per_host.entry(host.clone()).or_insert_with(|| HostUtilizationFeature {
                host,
                ..Default::default()
            });
            match metric.as_str() {
                "cpu_percent" => {
                    entry.avg_cpu_percent = row.get("avg");
                    entry.max_cpu_percent = row.get("max");
                }
                "memory_percent" => {
                    entry.avg_memory_percent = row.get("avg");
                    entry.max_memory_percent = row.get("max");
                }
                _ => {}
            }
        }

        let features: Vec<HostUtilizationFeature> = per_host.into_values().collect();
        self.store.replace_all(&features).await
    }
}
