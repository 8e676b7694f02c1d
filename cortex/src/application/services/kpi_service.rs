// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # KPI Service
//!
//! Periodically samples the materialized knowledge into prometheus
//! gauges: row count and generation age per feature table. Operators
//! alert on stale or empty tables, which are the silent failure mode of a
//! trigger-driven extraction pipeline.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use cortex_bootstrap::CancellationToken;

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::repositories::SqliteFeatureStore;

/// Periodic KPI gauge sampler.
pub struct KpiService {
    store: Arc<SqliteFeatureStore>,
    metrics: Arc<MetricsService>,
    interval: Duration,
}

impl KpiService {
    pub fn new(store: Arc<SqliteFeatureStore>, metrics: Arc<MetricsService>, interval: Duration) -> Self {
        Self {
            store,
            metrics,
            interval,
        }
    }

    /// Samples every registered feature table once.
    pub async fn collect(&self) {
        for table in self.store.registered_tables() {
            match self.store.row_count(&table).await {
                Ok(rows) => self.metrics.feature_rows.with_label_values(&[&table]).set(rows),
                Err(e) => warn!(%table, "failed to count feature rows: {}", e),
            }
            match self.store.generation_age_seconds(&table).await {
                Ok(Some(age)) => self.metrics.feature_age_seconds.with_label_values(&[&table]).set(age),
                Ok(None) => {}
                Err(e) => warn!(%table, "failed to read generation age: {}", e),
            }
        }
    }

    /// Samples on the configured interval until cancelled.
    pub async fn run(&self, token: CancellationToken) {
        loop {
            self.collect().await;
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::repositories::FeatureRecord;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct KpiProbe {
        host: String,
    }

    impl FeatureRecord for KpiProbe {
        const TABLE: &'static str = "feature_kpi_probe";
        fn schema() -> &'static str {
            "CREATE TABLE IF NOT EXISTS feature_kpi_probe (host TEXT PRIMARY KEY)"
        }
    }

    #[tokio::test]
    async fn test_collect_exports_row_counts() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<KpiProbe>().await.unwrap();
        store
            .replace_all(&[KpiProbe { host: "h1".into() }, KpiProbe { host: "h2".into() }])
            .await
            .unwrap();

        let metrics = Arc::new(MetricsService::new().unwrap());
        let service = KpiService::new(store, metrics.clone(), Duration::from_secs(60));
        service.collect().await;

        let text = metrics.encode().unwrap();
        assert!(text.contains("cortex_feature_rows{table=\"feature_kpi_probe\"} 2"));
        assert!(text.contains("cortex_feature_age_seconds"));
    }
}
