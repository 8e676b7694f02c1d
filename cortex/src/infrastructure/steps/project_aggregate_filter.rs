// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Aggregate Filter
//!
//! Keeps a host iff it carries no tenant restriction at all, or the
//! requesting tenant is in its allowed set. The allowed pairs come from
//! the project-aggregates feature table.

use async_trait::async_trait;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use cortex_domain::repositories::{KnowledgeStore, KnowledgeStoreExt};
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{PlacementRequest, SchedulerError, StepOptions, StepResult};

use crate::infrastructure::extractors::ProjectAggregateFeature;

/// Tenant-restriction filter for any domain that exposes a project.
pub struct ProjectAggregateFilter<R> {
    store: Option<Arc<dyn KnowledgeStore>>,
    _marker: PhantomData<R>,
}

impl<R> ProjectAggregateFilter<R> {
    pub fn new() -> Self {
        Self {
            store: None,
            _marker: PhantomData,
        }
    }
}

impl<R> Default for ProjectAggregateFilter<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: PlacementRequest> SchedulerStep<R> for ProjectAggregateFilter<R> {
    fn name(&self) -> &'static str {
        "project_aggregates"
    }

    async fn init(&mut self, options: StepOptions, store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
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
            .ok_or_else(|| SchedulerError::internal_error("project_aggregates used before init"))?;

        let pairs: Vec<ProjectAggregateFeature> = store.fetch().await?;
        let restricted: HashSet<&str> = pairs.iter().map(|p| p.host.as_str()).collect();
        let allowed: HashSet<(&str, &str)> = pairs
            .iter()
            .map(|p| (p.host.as_str(), p.project_id.as_str()))
            .collect();

        let kept = request
            .candidates()
            .iter()
            .map(|c| c.host.as_str())
            .filter(|host| !restricted.contains(host) || allowed.contains(&(host, project)));

        Ok(StepResult::keep_unchanged(kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::SqliteFeatureStore;
    use cortex_domain::{HostCandidate, ShareRequest, ShareSpec};
    use std::collections::HashMap;

    fn share_request(project: &str) -> ShareRequest {
        ShareRequest {
            request_id: "req-1".to_string(),
            spec: ShareSpec {
                project_id: project.to_string(),
                size_gb: 10,
                share_proto: None,
                share_type: None,
                availability_zone: None,
                share_properties: HashMap::new(),
            },
            candidates: ["h1", "h2", "h3"].iter().map(|h| HostCandidate::new(*h)).collect(),
            weights: HashMap::new(),
            pipeline: None,
        }
    }

    async fn seeded_store() -> Arc<SqliteFeatureStore> {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<ProjectAggregateFeature>().await.unwrap();
        store
            .replace_all(&[
                ProjectAggregateFeature {
                    host: "h1".to_string(),
                    project_id: "p1".to_string(),
                },
                ProjectAggregateFeature {
                    host: "h2".to_string(),
                    project_id: "p2".to_string(),
                },
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_restricted_host_requires_membership() {
        let store = seeded_store().await;
        let mut filter = ProjectAggregateFilter::<ShareRequest>::new();
        filter
            .init(StepOptions::from_json(serde_json::json!({})).unwrap(), store)
            .await
            .unwrap();

        let trace = StepTrace::new("req-1", "test", "project_aggregates");
        let result = filter.run(&trace, &share_request("p1")).await.unwrap();

        // h1 allows p1; h2 is restricted to p2; h3 is unrestricted.
        let mut kept: Vec<&str> = result.activations.keys().map(String::as_str).collect();
        kept.sort_unstable();
        assert_eq!(kept, vec!["h1", "h3"]);
    }

    #[tokio::test]
    async fn test_empty_table_keeps_everything() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<ProjectAggregateFeature>().await.unwrap();
        let mut filter = ProjectAggregateFilter::<ShareRequest>::new();
        filter
            .init(StepOptions::from_json(serde_json::json!({})).unwrap(), store)
            .await
            .unwrap();

        let trace = StepTrace::new("req-1", "test", "project_aggregates");
        let result = filter.run(&trace, &share_request("p1")).await.unwrap();
        assert_eq!(result.activations.len(), 3);
    }
}
