// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Host Contention Extractor
//!
//! Short- and long-window CPU steal per host, taken from the telemetry
//! cache. Consumed by the contention-avoidance weigher.

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
pub const TOPIC: &str = "cortex/features/host_contention";

/// CPU steal observed on one host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostContentionFeature {
    pub host: String,
    pub short_term_steal: f64,
    pub long_term_steal: f64,
}

impl FeatureRecord for HostContentionFeature {
    const TABLE: &'static str = "feature_host_contention";

    fn schema() -> &'static str {
        "CREATE TABLE IF NOT EXISTS feature_host_contention (
            host TEXT PRIMARY KEY,
            short_term_steal REAL NOT NULL,
            long_term_steal REAL NOT NULL
        )"
    }
}

/// Recomputes [`HostContentionFeature`] from the telemetry cache.
pub struct HostContentionExtractor {
    store: Arc<SqliteFeatureStore>,
}

impl HostContentionExtractor {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeatureExtractor for HostContentionExtractor {
    fn name(&self) -> &'static str {
        "host_contention"
    }

    fn table(&self) -> &'static str {
        HostContentionFeature::TABLE
    }

    fn triggers(&self) -> &'static [&'static str] {
        &[topics::SYNC_TELEMETRY]
    }

    fn publishes(&self) -> &'static str {
        TOPIC
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.register::<HostContentionFeature>().await
    }

    async fn run(&self) -> Result<u64, SchedulerError> {
        let rows = sqlx::query(
            "SELECT host, metric, avg FROM cache_telemetry \
             WHERE metric IN ('cpu_steal_short', 'cpu_steal_long')",
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(|e| SchedulerError::extractor_error(format!("host_contention: failed to read cache: {}", e)))?;

        let mut per_host: BTreeMap<String, HostContentionFeature> = BTreeMap::new();
        for row in rows {
            let host: String = row.get("host");
            let metric: String = row.get("metric");
            let entry = per_host.entry(host.clone()).or_insert_with(|| HostContentionFeature {
                host,
                ..Default::default()
            });
            match metric.as_str() {
                "cpu_steal_short" => entry.short_term_steal = row.get("avg"),
                "cpu_steal_long" => entry.long_term_steal = row.get("avg"),
                _ => {}
            }
        }

        let features: Vec<HostContentionFeature> = per_host.into_values().collect();
        self.store.replace_all(&features).await
    }
}
