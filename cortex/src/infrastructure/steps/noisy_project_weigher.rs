// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Anti-Affinity Noisy Projects Weigher
//!
//! Steers a project's new workloads away from hosts where the same
//! project is already noisy: for the requesting project, the per-host
//! noise score is scaled to a (usually negative) activation on every host
//! the project currently occupies. Hosts without a noise row for the
//! project stay untouched.

use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use cortex_domain::repositories::{KnowledgeStore, KnowledgeStoreExt};
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{MinMaxScale, PlacementRequest, SchedulerError, StepOptions, StepResult, StepStatistics};

use crate::infrastructure::extractors::ProjectNoiseFeature;

const NOISE_DEFAULTS: (f64, f64, f64, f64) = (20.0, 100.0, 0.0, -0.5);

/// Project anti-affinity weigher, for any domain that exposes a project.
pub struct NoisyProjectWeigher<R> {
    noise: MinMaxScale,
    store: Option<Arc<dyn KnowledgeStore>>,
    _marker: PhantomData<R>,
}

impl<R> NoisyProjectWeigher<R> {
    pub fn new() -> Self {
        Self {
            noise: MinMaxScale::new(NOISE_DEFAULTS.0, NOISE_DEFAULTS.1, NOISE_DEFAULTS.2, NOISE_DEFAULTS.3)
                .expect("default noise bounds are valid"),
            store: None,
            _marker: PhantomData,
        }
    }
}

impl<R> Default for NoisyProjectWeigher<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: PlacementRequest> SchedulerStep<R> for NoisyProjectWeigher<R> {
    fn name(&self) -> &'static str {
        "anti_affinity_noisy_projects"
    }

    async fn init(&mut self, mut options: StepOptions, store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
        self.noise = MinMaxScale::from_options(&mut options, "avgCpu", NOISE_DEFAULTS)?;
        self.store = Some(store);
        options.finish()
    }

    async fn run(&self, _trace: &StepTrace, request: &R) -> Result<StepResult, SchedulerError> {
        let project = match request.project_id() {
            Some(project) => project,
            None => return Err(SchedulerError::step_skipped("request carries no project")),
        };
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| SchedulerError::internal_error("noisy-project weigher used before init"))?;

        let rows: Vec<ProjectNoiseFeature> = store.fetch().await?;
        let noise_by_host: HashMap<&str, f64> = rows
            .iter()
            .filter(|row| row.project_id == project)
            .map(|row| (row.host.as_str(), row.avg_cpu_percent))
            .collect();

        let mut activations = HashMap::new();
        let mut observed = StepStatistics::new("percent");
        for candidate in request.candidates() {
            let host = candidate.host.as_str();
            let activation = match noise_by_host.get(host) {
                None => 0.0,
                Some(noise) => {
                    observed = observed.with_host(host, *noise);
                    self.noise.apply(*noise)
                }
            };
            activations.insert(host.to_string(), activation);
        }

        Ok(StepResult::from_activations(activations).with_statistics("project noise", observed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::SqliteFeatureStore;
    use cortex_domain::{HostCandidate, ShareRequest, ShareSpec};

    fn request(project: &str) -> ShareRequest {
        ShareRequest {
            request_id: "req-1".to_string(),
            spec: ShareSpec {
                project_id: project.to_string(),
                size_gb: 1,
                share_proto: None,
                share_type: None,
                availability_zone: None,
                share_properties: Default::default(),
            },
            candidates: ["h1", "h2", "h3"].iter().map(|h| HostCandidate::new(*h)).collect(),
            weights: Default::default(),
            pipeline: None,
        }
    }

    fn noise(project: &str, host: &str, avg: f64) -> ProjectNoiseFeature {
        ProjectNoiseFeature {
            project_id: project.to_string(),
            host: host.to_string(),
            avg_cpu_percent: avg,
        }
    }

    /// Seeded scenario: rows (P, h1, 25) and (P, h2, 30) with bounds
    /// [20, 100] -> [0, -0.5] push h1 and h2 negative, h3 unchanged.
    #[tokio::test]
    async fn test_noisy_hosts_go_negative_others_unchanged() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<ProjectNoiseFeature>().await.unwrap();
        store
            .replace_all(&[noise("P", "h1", 25.0), noise("P", "h2", 30.0), noise("other", "h3", 99.0)])
            .await
            .unwrap();

        let mut weigher = NoisyProjectWeigher::<ShareRequest>::new();
        weigher
            .init(StepOptions::from_json(serde_json::json!({})).unwrap(), store)
            .await
            .unwrap();

        let trace = StepTrace::new("req-1", "test", "anti_affinity_noisy_projects");
        let result = weigher.run(&trace, &request("P")).await.unwrap();

        assert!(result.activations["h1"] < 0.0);
        assert!(result.activations["h2"] < result.activations["h1"]);
        assert_eq!(result.activations["h3"], 0.0);
        // Weigher contract: all candidates covered.
        assert_eq!(result.activations.len(), 3);
    }
}
