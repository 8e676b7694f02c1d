// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Aggregates Extractor
//!
//! Flattens host aggregates with tenant restrictions into (host, project)
//! pairs. A host that appears in this table is restricted to the listed
//! projects; a host absent from it accepts any tenant. Consumed by the
//! project-aggregate filter.

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
pub const TOPIC: &str = "cortex/features/project_aggregates";

/// One allowed (host, project) pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAggregateFeature {
    pub host: String,
    pub project_id: String,
}

impl FeatureRecord for ProjectAggregateFeature {
    const TABLE: &'static str = "feature_project_aggregates";

    fn schema() -> &'static str {
        "CREATE TABLE IF NOT EXISTS feature_project_aggregates (
            host TEXT NOT NULL,
            project_id TEXT NOT NULL,
            PRIMARY KEY (host, project_id)
        )"
    }

    fn indexes() -> &'static [&'static str] {
        &["CREATE INDEX IF NOT EXISTS idx_feature_project_aggregates_host ON feature_project_aggregates (host)"]
    }
}

/// Recomputes [`ProjectAggregateFeature`] from the aggregate cache.
pub struct ProjectAggregatesExtractor {
    store: Arc<SqliteFeatureStore>,
}

impl ProjectAggregatesExtractor {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeatureExtractor for ProjectAggregatesExtractor {
    fn name(&self) -> &'static str {
        "project_aggregates"
    }

    fn table(&self) -> &'static str {
        ProjectAggregateFeature::TABLE
    }

    fn triggers(&self) -> &'static [&'static str] {
        &[topics::SYNC_HYPERVISORS]
    }

    fn publishes(&self) -> &'static str {
        TOPIC
    }

    async fn init(&self) -> Result<(), SchedulerError> {
        self.store.register::<ProjectAggregateFeature>().await
    }

    async fn run(&self) -> Result<u64, SchedulerError> {
        let rows = sqlx::query(
            "SELECT DISTINCT service_host, project_id FROM cache_aggregates WHERE project_id IS NOT NULL",
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(|e| SchedulerError::extractor_error(format!("project_aggregates: failed to read cache: {}", e)))?;

        let features: Vec<ProjectAggregateFeature> = rows
            .into_iter()
            .map(|row| ProjectAggregateFeature {
                host: row.get("service_host"),
                project_id: row.get("project_id"),
            })
            .collect();

        self.store.replace_all(&features).await
    }
}
