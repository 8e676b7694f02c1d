// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Avoid-Overloaded-Host Weighers
//!
//! Penalizes hosts whose telemetry-derived utilization is high. Two
//! variants share the implementation: one reads CPU utilization, one
//! memory. Each scales the average and the maximum through its own
//! bounds and adds the two (usually negative) activations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use cortex_domain::repositories::{KnowledgeStore, KnowledgeStoreExt};
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{MinMaxScale, PlacementRequest, SchedulerError, StepOptions, StepResult, StepStatistics};

use crate::infrastructure::extractors::HostUtilizationFeature;

/// Which utilization series the weigher reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilizationKind {
    Cpu,
    Memory,
}

/// Below the lower bound a host is not considered loaded at all; above
/// it the penalty grows linearly to the full activation.
const AVG_DEFAULTS: (f64, f64, f64, f64) = (60.0, 100.0, 0.0, -1.0);
const MAX_DEFAULTS: (f64, f64, f64, f64) = (80.0, 100.0, 0.0, -1.0);

/// Utilization-avoidance weigher, for any scheduling domain.
pub struct OverloadedHostWeigher<R> {
    kind: UtilizationKind,
    avg: MinMaxScale,
    max: MinMaxScale,
    store: Option<Arc<dyn KnowledgeStore>>,
    _marker: PhantomData<R>,
}

impl<R> OverloadedHostWeigher<R> {
    fn new(kind: UtilizationKind) -> Self {
        Self {
            kind,
            avg: MinMaxScale::new(AVG_DEFAULTS.0, AVG_DEFAULTS.1, AVG_DEFAULTS.2, AVG_DEFAULTS.3)
                .expect("default avg bounds are valid"),
            max: MinMaxScale::new(MAX_DEFAULTS.0, MAX_DEFAULTS.1, MAX_DEFAULTS.2, MAX_DEFAULTS.3)
                .expect("default max bounds are valid"),
            store: None,
            _marker: PhantomData,
        }
    }

    pub fn cpu() -> Self {
        Self::new(UtilizationKind::Cpu)
    }

    pub fn memory() -> Self {
        Self::new(UtilizationKind::Memory)
    }

    fn series(&self, feature: &HostUtilizationFeature) -> (f64, f64) {
        match self.kind {
            UtilizationKind::Cpu => (feature.avg_cpu_percent, feature.max_cpu_percent),
            UtilizationKind::Memory => (feature.avg_memory_percent, feature.max_memory_percent),
        }
    }
}

#[async_trait]
impl<R: PlacementRequest> SchedulerStep<R> for OverloadedHostWeigher<R> {
    fn name(&self) -> &'static str {
        match self.kind {
            UtilizationKind::Cpu => "avoid_overloaded_cpu",
            UtilizationKind::Memory => "avoid_overloaded_memory",
        }
    }

    async fn init(&mut self, mut options: StepOptions, store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
        self.avg = MinMaxScale::from_options(&mut options, "avg", AVG_DEFAULTS)?;
        self.max = MinMaxScale::from_options(&mut options, "max", MAX_DEFAULTS)?;
        self.store = Some(store);
        options.finish()
    }

    async fn run(&self, _trace: &StepTrace, request: &R) -> Result<StepResult, SchedulerError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| SchedulerError::internal_error("overloaded-host weigher used before init"))?;
        let features: Vec<HostUtilizationFeature> = store.fetch().await?;
        let by_host: HashMap<&str, &HostUtilizationFeature> =
            features.iter().map(|f| (f.host.as_str(), f)).collect();

        let mut activations = HashMap::new();
        let mut observed = StepStatistics::new("percent");
        for candidate in request.candidates() {
            let host = candidate.host.as_str();
            let activation = match by_host.get(host) {
                None => 0.0,
                Some(feature) => {
                    let (avg, max) = self.series(feature);
                    observed = observed.with_host(host, avg);
                    self.avg.apply(avg) + self.max.apply(max)
                }
            };
            activations.insert(host.to_string(), activation);
        }

        Ok(StepResult::from_activations(activations).with_statistics("average utilization", observed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::SqliteFeatureStore;
    use cortex_domain::{HostCandidate, VolumeRequest, VolumeSpec};
    use serde_json::json;

    fn request() -> VolumeRequest {
        VolumeRequest {
            request_id: "req-1".to_string(),
            spec: VolumeSpec {
                project_id: "p".to_string(),
                size_gb: 100,
                volume_type: None,
                availability_zone: None,
            },
            candidates: vec![HostCandidate::new("h1"), HostCandidate::new("h2")],
            weights: Default::default(),
            pipeline: None,
        }
    }

    fn utilization(host: &str, avg_cpu: f64, max_cpu: f64) -> HostUtilizationFeature {
        HostUtilizationFeature {
            host: host.to_string(),
            avg_cpu_percent: avg_cpu,
            max_cpu_percent: max_cpu,
            avg_memory_percent: 0.0,
            max_memory_percent: 0.0,
        }
    }

    #[tokio::test]
    async fn test_loaded_host_is_penalized() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<HostUtilizationFeature>().await.unwrap();
        store
            .replace_all(&[utilization("h1", 80.0, 90.0), utilization("h2", 10.0, 20.0)])
            .await
            .unwrap();

        let mut weigher = OverloadedHostWeigher::<VolumeRequest>::cpu();
        weigher
            .init(StepOptions::from_json(json!({})).unwrap(), store)
            .await
            .unwrap();

        let trace = StepTrace::new("req-1", "test", "avoid_overloaded_cpu");
        let result = weigher.run(&trace, &request()).await.unwrap();

        // avg 80 in [60,100] -> -0.5; max 90 in [80,100] -> -0.5.
        assert_eq!(result.activations["h1"], -1.0);
        // Both series below their lower bounds: no effect.
        assert_eq!(result.activations["h2"], 0.0);
        assert_eq!(result.activations.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_variant_reads_memory_series() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<HostUtilizationFeature>().await.unwrap();
        let mut feature = utilization("h1", 0.0, 0.0);
        feature.avg_memory_percent = 100.0;
        feature.max_memory_percent = 100.0;
        store.replace_all(&[feature]).await.unwrap();

        let mut weigher = OverloadedHostWeigher::<VolumeRequest>::memory();
        weigher
            .init(StepOptions::from_json(json!({})).unwrap(), store)
            .await
            .unwrap();

        let trace = StepTrace::new("req-1", "test", "avoid_overloaded_memory");
        let result = weigher.run(&trace, &request()).await.unwrap();
        assert_eq!(result.activations["h1"], -2.0);
    }
}
