// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Binpacking Weigher
//!
//! Prefers hosts where the flavor fits tightest. For a single-instance
//! request, each capacity dimension contributes the min-max scaled
//! residual that would remain *after* placement (`free - requested`,
//! negative when the flavor does not fit), and the three activations are
//! added. Hosts absent from the capacity feature table contribute `0.0`.
//!
//! Multi-instance requests are a deliberate no-op: dividing residuals
//! across instances is unspecified at the design level, so the step keeps
//! every candidate unchanged rather than guess.
//!
//! The step expresses a hard capacity score, so it bypasses tanh
//! saturation with the identity activation function.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use cortex_domain::repositories::{KnowledgeStore, KnowledgeStoreExt};
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{
    ActivationFunction, ComputeRequest, FlavorClass, MinMaxScale, SchedulerError, StepOptions, StepResult,
    StepStatistics,
};

use crate::infrastructure::extractors::HostCapacityFeature;

/// Default bounds per dimension: residual-after-placement domain mapped
/// onto `[0, 1]`. A perfect fit scores 1.0 per dimension; a host the
/// flavor does not fit scores 0.0.
const RAM_DEFAULTS: (f64, f64, f64, f64) = (-16384.0, 0.0, 0.0, 1.0);
const CPU_DEFAULTS: (f64, f64, f64, f64) = (-16.0, 0.0, 0.0, 1.0);
const DISK_DEFAULTS: (f64, f64, f64, f64) = (-500.0, 0.0, 0.0, 1.0);

/// Capacity-fit weigher for compute requests.
pub struct BinpackingWeigher {
    ram: MinMaxScale,
    cpu: MinMaxScale,
    disk: MinMaxScale,
    /// Flavor allow-list; when set, other flavors skip the step.
    flavors: Option<Vec<String>>,
    store: Option<Arc<dyn KnowledgeStore>>,
}

impl BinpackingWeigher {
    pub fn new() -> Self {
        Self {
            ram: MinMaxScale::new(RAM_DEFAULTS.0, RAM_DEFAULTS.1, RAM_DEFAULTS.2, RAM_DEFAULTS.3)
                .expect("default ram bounds are valid"),
            cpu: MinMaxScale::new(CPU_DEFAULTS.0, CPU_DEFAULTS.1, CPU_DEFAULTS.2, CPU_DEFAULTS.3)
                .expect("default cpu bounds are valid"),
            disk: MinMaxScale::new(DISK_DEFAULTS.0, DISK_DEFAULTS.1, DISK_DEFAULTS.2, DISK_DEFAULTS.3)
                .expect("default disk bounds are valid"),
            flavors: None,
            store: None,
        }
    }
}

impl Default for BinpackingWeigher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerStep<ComputeRequest> for BinpackingWeigher {
    fn name(&self) -> &'static str {
        "binpacking"
    }

    fn activation_function(&self) -> ActivationFunction {
        ActivationFunction::Identity
    }

    async fn init(&mut self, mut options: StepOptions, store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
        self.ram = MinMaxScale::from_options(&mut options, "ram", RAM_DEFAULTS)?;
        self.cpu = MinMaxScale::from_options(&mut options, "cpu", CPU_DEFAULTS)?;
        self.disk = MinMaxScale::from_options(&mut options, "disk", DISK_DEFAULTS)?;
        self.flavors = options.get_string_list("flavors")?;
        self.store = Some(store);
        options.finish()
    }

    async fn run(&self, _trace: &StepTrace, request: &ComputeRequest) -> Result<StepResult, SchedulerError> {
        let flavor = &request.spec.flavor;
        if let Some(allowed) = &self.flavors {
            let flavor_name = flavor.name.as_deref().unwrap_or(&flavor.id);
            if !allowed.iter().any(|f| f == flavor_name) {
                return Err(SchedulerError::step_skipped(format!(
                    "flavor {} is not binpacked",
                    flavor_name
                )));
            }
        }
        // HANA exclusive flavors land on dedicated hosts; residual fit
        // scoring carries no signal there.
        if flavor.flavor_class()? == FlavorClass::Hana {
            return Err(SchedulerError::step_skipped(
                "HANA exclusive flavors are placed on dedicated hosts",
            ));
        }

        let hosts = request.candidates.iter().map(|c| c.host.as_str());

        if request.spec.num_instances > 1 {
            // Residual division across instances is unspecified; no-op.
            return Ok(StepResult::keep_unchanged(hosts));
        }

        let store = self
            .store
            .as_ref()
            .ok_or_else(|| SchedulerError::internal_error("binpacking used before init"))?;
        let features: Vec<HostCapacityFeature> = store.fetch().await?;
        let by_host: HashMap<&str, &HostCapacityFeature> =
            features.iter().map(|f| (f.host.as_str(), f)).collect();

        let mut activations = HashMap::new();
        let mut free_memory = StepStatistics::new("MB");

        for host in hosts {
            let activation = match by_host.get(host) {
                None => 0.0,
                Some(feature) => {
                    free_memory = free_memory.with_host(host, feature.memory_free_mb as f64);
                    let ram_residual = feature.memory_free_mb as f64 - flavor.memory_mb as f64;
                    let cpu_residual = feature.vcpus_free as f64 - flavor.vcpus as f64;
                    let disk_residual = feature.disk_free_gb as f64 - flavor.root_disk_gb as f64;
                    self.ram.apply(ram_residual) + self.cpu.apply(cpu_residual) + self.disk.apply(disk_residual)
                }
            };
            activations.insert(host.to_string(), activation);
        }

        Ok(StepResult::from_activations(activations).with_statistics("free memory", free_memory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::SqliteFeatureStore;
    use cortex_domain::{ComputeFlags, ComputeSpec, Flavor, HostCandidate, PlacementRequest};
    use serde_json::json;

    fn capacity(host: &str, memory: i64, vcpus: i64, disk: i64) -> HostCapacityFeature {
        HostCapacityFeature {
            host: host.to_string(),
            total_memory_mb: memory,
            memory_free_mb: memory,
            total_vcpus: vcpus,
            vcpus_free: vcpus,
            total_disk_gb: disk,
            disk_free_gb: disk,
        }
    }

    fn request(num_instances: u32) -> ComputeRequest {
        ComputeRequest {
            request_id: "req-1".to_string(),
            spec: ComputeSpec {
                flavor: Flavor {
                    id: "f".to_string(),
                    name: None,
                    memory_mb: 2048,
                    vcpus: 2,
                    root_disk_gb: 200,
                    extra_specs: Default::default(),
                },
                project_id: "p".to_string(),
                num_instances,
                availability_zone: None,
                scheduler_hints: Default::default(),
                image_meta: None,
                force_hosts: None,
                ignore_hosts: None,
            },
            flags: ComputeFlags::default(),
            candidates: vec![HostCandidate::new("h1"), HostCandidate::new("h2")],
            weights: Default::default(),
            pipeline: None,
        }
    }

    async fn weigher_with(features: &[HostCapacityFeature], options: serde_json::Value) -> BinpackingWeigher {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        store.register::<HostCapacityFeature>().await.unwrap();
        store.replace_all(features).await.unwrap();

        let mut weigher = BinpackingWeigher::new();
        weigher
            .init(StepOptions::from_json(options).unwrap(), store)
            .await
            .unwrap();
        weigher
    }

    /// Seeded scenario: bounds chosen so each dimension's activation
    /// equals the fractional match, giving h2 a perfect 3.0 and h1 0.0.
    #[tokio::test]
    async fn test_single_instance_fractional_match() {
        let weigher = weigher_with(
            &[capacity("h1", 1024, 1, 100), capacity("h2", 2048, 2, 200)],
            json!({
                "ramLowerBound": -1024.0, "ramUpperBound": 0.0,
                "ramActivationLowerBound": 0.0, "ramActivationUpperBound": 1.0,
                "cpuLowerBound": -1.0, "cpuUpperBound": 0.0,
                "cpuActivationLowerBound": 0.0, "cpuActivationUpperBound": 1.0,
                "diskLowerBound": -100.0, "diskUpperBound": 0.0,
                "diskActivationLowerBound": 0.0, "diskActivationUpperBound": 1.0,
            }),
        )
        .await;

        let trace = StepTrace::new("req-1", "test", "binpacking");
        let result = weigher.run(&trace, &request(1)).await.unwrap();

        assert_eq!(result.activations["h2"], 3.0);
        assert_eq!(result.activations["h1"], 0.0);
        assert!(result.is_finite());
    }

    #[tokio::test]
    async fn test_multi_instance_is_noop() {
        let weigher = weigher_with(&[capacity("h1", 1024, 1, 100)], json!({})).await;
        let trace = StepTrace::new("req-1", "test", "binpacking");
        let result = weigher.run(&trace, &request(2)).await.unwrap();
        assert!(result.activations.values().all(|v| *v == 0.0));
        assert_eq!(result.activations.len(), 2);
    }

    #[tokio::test]
    async fn test_weigher_covers_all_candidates() {
        // h2 is missing from the feature table and still gets 0.0.
        let weigher = weigher_with(&[capacity("h1", 4096, 8, 500)], json!({})).await;
        let request = request(1);
        let trace = StepTrace::new("req-1", "test", "binpacking");
        let result = weigher.run(&trace, &request).await.unwrap();
        assert_eq!(result.activations.len(), request.candidates().len());
        assert_eq!(result.activations["h2"], 0.0);
    }

    #[tokio::test]
    async fn test_equal_bounds_rejected_at_init() {
        let store = Arc::new(SqliteFeatureStore::in_memory().await.unwrap());
        let mut weigher = BinpackingWeigher::new();
        let err = weigher
            .init(
                StepOptions::from_json(json!({"ramLowerBound": 5.0, "ramUpperBound": 5.0})).unwrap(),
                store,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ram"));
    }

    #[test]
    fn test_uses_identity_activation() {
        let weigher = BinpackingWeigher::new();
        assert_eq!(
            SchedulerStep::<ComputeRequest>::activation_function(&weigher),
            ActivationFunction::Identity
        );
    }

    #[tokio::test]
    async fn test_flavor_allow_list_skips_other_flavors() {
        let weigher = weigher_with(
            &[capacity("h1", 4096, 8, 500)],
            json!({"flavors": ["m1.binpacked"]}),
        )
        .await;
        let mut request = request(1);
        request.spec.flavor.name = Some("m1.other".to_string());

        let trace = StepTrace::new("req-1", "test", "binpacking");
        let err = weigher.run(&trace, &request).await.unwrap_err();
        assert!(err.is_skip());
    }

    #[tokio::test]
    async fn test_hana_exclusive_flavor_skips() {
        let weigher = weigher_with(&[capacity("h1", 4096, 8, 500)], json!({})).await;
        let mut request = request(1);
        request
            .spec
            .flavor
            .extra_specs
            .insert("trait:CUSTOM_HANA_EXCLUSIVE_HOST".to_string(), "required".to_string());

        let trace = StepTrace::new("req-1", "test", "binpacking");
        let err = weigher.run(&trace, &request).await.unwrap_err();
        assert!(err.is_skip());
    }
}
