// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Contention Avoidance Weigher
//!
//! Penalizes hosts showing CPU steal: the short- and long-window steal
//! values are scaled through their own bounds and added.

use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use cortex_domain::repositories::{KnowledgeStore, KnowledgeStoreExt};
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{MinMaxScale, PlacementRequest, SchedulerError, StepOptions, StepResult};

use crate::infrastructure::extractors::HostContentionFeature;

const SHORT_DEFAULTS: (f64, f64, f64, f64) = (0.0, 50.0, 0.0, -0.5);
const LONG_DEFAULTS: (f64, f64, f64, f64) = (0.0, 50.0, 0.0, -0.25);

/// CPU-steal avoidance weigher, for any scheduling domain.
pub struct ContentionWeigher<R> {
    short_term: MinMaxScale,
    long_term: MinMaxScale,
    store: Option<Arc<dyn KnowledgeStore>>,
    _marker: PhantomData<R>,
}

impl<R> ContentionWeigher<R> {
    pub fn new() -> Self {
        Self {
            short_term: MinMaxScale::new(SHORT_DEFAULTS.0, SHORT_DEFAULTS.1, SHORT_DEFAULTS.2, SHORT_DEFAULTS.3)
                .expect("default short-term bounds are valid"),
            long_term: MinMaxScale::new(LONG_DEFAULTS.0, LONG_DEFAULTS.1, LONG_DEFAULTS.2, LONG_DEFAULTS.3)
                .expect("default long-term bounds are valid"),
            store: None,
            _marker: PhantomData,
        }
    }
}

impl<R> Default for ContentionWeigher<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: PlacementRequest> SchedulerStep<R> for ContentionWeigher<R> {
    fn name(&self) -> &'static str {
        "avoid_contended_hosts"
    }

    async fn init(&mut self, mut options: StepOptions, store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
        self.short_term = MinMaxScale::from_options(&mut options, "shortTerm", SHORT_DEFAULTS)?;
        self.long_term = MinMaxScale::from_options(&mut options, "longTerm", LONG_DEFAULTS)?;
        self.store = Some(store);
        options.finish()
    }

    async fn run(&self, _trace: &StepTrace, request: &R) -> Result<StepResult, SchedulerError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| SchedulerError::internal_error("contention weigher used before init"))?;
        let features: Vec<HostContentionFeature> = store.fetch().await?;
        let by_host: HashMap<&str, &HostContentionFeature> =
            features.iter().map(|f| (f.host.as_str(), f)).collect();

        let mut activations = HashMap::new();
        for candidate in request.candidates() {
            let host = candidate.host.as_str();
            let activation = match by_host.get(host) {
                None => 0.0,
                Some(feature) => {
                    self.short_term.apply(feature.short_term_steal) + self.long_term.apply(feature.long_term_steal)
                }
            };
            activations.insert(host.to_string(), activation);
        }

        Ok(StepResult::from_activations(activations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::SqliteFeatureStore;
    use cortex_domain::{HostCandidate, PodRequest};

    fn request() -> PodRequest {
        PodRequest {
            request_id: "req-1".to_string(),
            spec: None,
            candidates: vec![HostCandidate::new("n1"), HostCandidate::new("n2")],
            weights: Default::default(),
            pipeline: None,
        }
    }

    #[tokio::test]
    async fn test_contended_host_penalized() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<HostContentionFeature>().await.unwrap();
        store
            .replace_all(&[HostContentionFeature {
                host: "n1".to_string(),
                short_term_steal: 50.0,
                long_term_steal: 25.0,
            }])
            .await
            .unwrap();

        let mut weigher = ContentionWeigher::<PodRequest>::new();
        weigher
            .init(StepOptions::from_json(serde_json::json!({})).unwrap(), store)
            .await
            .unwrap();

        let trace = StepTrace::new("req-1", "test", "avoid_contended_hosts");
        let result = weigher.run(&trace, &request()).await.unwrap();

        // short 50 -> -0.5; long 25 -> -0.125.
        assert_eq!(result.activations["n1"], -0.625);
        assert_eq!(result.activations["n2"], 0.0);
    }
}
