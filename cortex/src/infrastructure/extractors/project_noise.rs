// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Noise Extractor
//!
//! Scores how noisy each project is on each host it currently occupies,
//! by joining the server inventory against host CPU telemetry. The
//! anti-affinity weigher uses it to steer a project's new workloads away
//! from hosts where that project is already loud.

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
pub const TOPIC: &str = "cortex/features/project_noise";

/// Noise score of one project on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectNoiseFeature {
    pub project_id: String,
    pub host: String,
    pub avg_cpu_percent: f64,
}

impl FeatureRecord for ProjectNoiseFeature {
    const TABLE: &'static str = "feature_project_noise";

    fn schema() -> &'static str {
        "CREATE TABLE IF NOT EXISTS feature_project_noise (
            project_id TEXT NOT NULL,
            host TEXT NOT NULL,
            avg_cpu_percent REAL NOT NULL,
            PRIMARY KEY (project_id, host)
        )"
    }

    fn indexes() -> &'static [&'static str] {
        &["CREATE INDEX IF NOT EXISTS idx_feature_project_noise_project ON feature_project_noise (project_id)"]
    }
}

/// Recomputes [`ProjectNoiseFeature`] from servers and telemetry.
pub struct ProjectNoiseExtractor {
    store: Arc<SqliteFeatureStore>,
}

impl ProjectNoiseExtractor {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeatureExtractor for ProjectNoiseExtractor {
    fn name(&self) -> &'static str {
        "project_noise"
    }

    fn table(&self) -> &'static str {
        ProjectNoiseFeature::TABLE
    }

    fn triggers(&self) -> &'static [&'static str] {
        &[topics::SYNC_SERVERS, topics::SYNC_TELEMETRY]
    }

    fn publishes(&self) -> &'static str {
        TOPIC
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.register::<ProjectNoiseFeature>().await
    }

    async fn run(&self) -> Result<u64, SchedulerError> {
        let rows = sqlx::query(
            "SELECT DISTINCT s.project_id AS project_id, s.host AS host, t.avg AS avg_cpu \
             FROM cache_servers s \
             JOIN cache_telemetry t ON t.host = s.host AND t.metric = 'cpu_percent'",
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(|e| SchedulerError::extractor_error(format!("project_noise: failed to read cache: {}", e)))?;

        let features: Vec<ProjectNoiseFeature> = rows
            .into_iter()
            .map(|row| ProjectNoiseFeature {
                project_id: row.get("project_id"),
                host: row.get("host"),
                avg_cpu_percent: row.get("avg_cpu"),
            })
            .collect();

        self.store.replace_all(&features).await
    }
}
