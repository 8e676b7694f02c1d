// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Host Instruction Filter
//!
//! Honors caller-supplied force and ignore lists. Precedence: when a
//! force list is present only forced hosts survive; the ignore list is
//! applied afterwards, so ignore wins over force when they intersect.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

use cortex_domain::repositories::KnowledgeStore;
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{PlacementRequest, SchedulerError, StepOptions, StepResult};

/// Filter applying caller force/ignore host lists, for any domain.
pub struct HostInstructionFilter<R> {
    _marker: PhantomData<R>,
}

impl<R> HostInstructionFilter<R> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<R> Default for HostInstructionFilter<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: PlacementRequest> SchedulerStep<R> for HostInstructionFilter<R> {
    fn name(&self) -> &'static str {
        "host_instructions"
    }

    async fn init(&mut self, options: StepOptions, _store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
        options.finish()
    }

    async fn run(&self, _trace: &StepTrace, request: &R) -> Result<StepResult, SchedulerError> {
        let instructions = request.host_instructions();
        let mut kept: Vec<&str> = request.candidates().iter().map(|c| c.host.as_str()).collect();

        if let Some(forced) = &instructions.force_hosts {
            kept.retain(|host| forced.iter().any(|f| f == host));
        }
        // Ignore is applied after force: a host on both lists is removed.
        if let Some(ignored) = &instructions.ignore_hosts {
            kept.retain(|host| !ignored.iter().any(|i| i == host));
        }

        Ok(StepResult::keep_unchanged(kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::{ComputeFlags, ComputeRequest, ComputeSpec, Flavor, HostCandidate};
    use std::collections::HashMap;

    fn request(force: Option<Vec<&str>>, ignore: Option<Vec<&str>>) -> ComputeRequest {
        ComputeRequest {
            request_id: "req-1".to_string(),
            spec: ComputeSpec {
                flavor: Flavor {
                    id: "f".to_string(),
                    name: None,
                    memory_mb: 1024,
                    vcpus: 1,
                    root_disk_gb: 10,
                    extra_specs: HashMap::new(),
                },
                project_id: "p".to_string(),
                num_instances: 1,
                availability_zone: None,
                scheduler_hints: HashMap::new(),
                image_meta: None,
                force_hosts: force.map(|v| v.into_iter().map(String::from).collect()),
                ignore_hosts: ignore.map(|v| v.into_iter().map(String::from).collect()),
            },
            flags: ComputeFlags::default(),
            candidates: ["h1", "h2", "h3"].iter().map(|h| HostCandidate::new(*h)).collect(),
            weights: HashMap::new(),
            pipeline: None,
        }
    }

    async fn run_filter(request: &ComputeRequest) -> StepResult {
        let store: Arc<dyn KnowledgeStore> =
            Arc::new(crate::infrastructure::repositories::SqliteFeatureStore::in_memory().await.unwrap());
        let mut filter = HostInstructionFilter::<ComputeRequest>::new();
        filter
            .init(StepOptions::from_json(serde_json::json!({})).unwrap(), store)
            .await
            .unwrap();
        let trace = StepTrace::new("req-1", "test", "host_instructions");
        filter.run(&trace, request).await.unwrap()
    }

    #[tokio::test]
    async fn test_no_instructions_keeps_everything() {
        let result = run_filter(&request(None, None)).await;
        assert_eq!(result.activations.len(), 3);
    }

    #[tokio::test]
    async fn test_force_list_is_exclusive() {
        let result = run_filter(&request(Some(vec!["h2"]), None)).await;
        assert_eq!(result.activations.keys().collect::<Vec<_>>(), vec!["h2"]);
    }

    #[tokio::test]
    async fn test_ignore_wins_over_force() {
        let result = run_filter(&request(Some(vec!["h1", "h2"]), Some(vec!["h2"]))).await;
        assert_eq!(result.activations.keys().collect::<Vec<_>>(), vec!["h1"]);
    }

    #[tokio::test]
    async fn test_unknown_option_rejected_at_init() {
        let store: Arc<dyn KnowledgeStore> =
            Arc::new(crate::infrastructure::repositories::SqliteFeatureStore::in_memory().await.unwrap());
        let mut filter = HostInstructionFilter::<ComputeRequest>::new();
        let err = filter
            .init(
                StepOptions::from_json(serde_json::json!({"surprise": 1})).unwrap(),
                store,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("surprise"));
    }
}
