// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete feature extractors. Each owns exactly one feature table and
//! declares the record type weigher steps read back.

pub mod host_capacity;
pub mod host_contention;
pub mod host_utilization;
pub mod project_aggregates;
pub mod project_noise;

use std::sync::Arc;

use cortex_domain::services::FeatureExtractor;

use crate::infrastructure::repositories::SqliteFeatureStore;

pub use host_capacity::{HostCapacityExtractor, HostCapacityFeature};
pub use host_contention::{HostContentionExtractor, HostContentionFeature};
pub use host_utilization::{HostUtilizationExtractor, HostUtilizationFeature};
pub use project_aggregates::{ProjectAggregateFeature, ProjectAggregatesExtractor};
pub use project_noise::{ProjectNoiseExtractor, ProjectNoiseFeature};

/// All built-in extractors against the given store, optionally limited
/// to an enable list.
pub fn build_extractors(
    store: &Arc<SqliteFeatureStore>,
    enabled: Option<&[String]>,
) -> Vec<Arc<dyn FeatureExtractor>> {
    let all: Vec<Arc<dyn FeatureExtractor>> = vec![
        Arc::new(HostCapacityExtractor::new(store.clone())),
        Arc::new(HostUtilizationExtractor::new(store.clone())),
        Arc::new(ProjectNoiseExtractor::new(store.clone())),
        Arc::new(HostContentionExtractor::new(store.clone())),
        Arc::new(ProjectAggregatesExtractor::new(store.clone())),
    ];
    match enabled {
        None => all,
        Some(names) => all
            .into_iter()
            .filter(|e| names.iter().any(|n| n == e.name()))
            .collect(),
    }
}

/// Registers every built-in feature table without building extractors.
///
/// The scheduler daemon calls this so steps can read (possibly empty)
/// tables before the extractor daemon has populated them.
pub async fn register_feature_tables(store: &SqliteFeatureStore) -> Result<(), cortex_domain::SchedulerError> {
    store.register::<HostCapacityFeature>().await?;
    store.register::<HostUtilizationFeature>().await?;
    store.register::<ProjectNoiseFeature>().await?;
    store.register::<HostContentionFeature>().await?;
    store.register::<ProjectAggregateFeature>().await?;
    Ok(())
}
