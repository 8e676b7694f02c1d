// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Registry
//!
//! Process-wide mapping from step name to constructor, one registry per
//! scheduling domain. Registries are built once at program start and
//! never mutated afterwards; pipeline construction looks names up and
//! instantiates fresh step values, so pipelines never share step state.

use std::collections::HashMap;

use cortex_domain::services::SchedulerStep;
use cortex_domain::{
    ComputeRequest, MachineRequest, PlacementRequest, PodRequest, SchedulerError, ShareRequest, VolumeRequest,
};

use crate::infrastructure::steps::{
    BinpackingWeigher, ContentionWeigher, HostInstructionFilter, NoisyProjectWeigher, OverloadedHostWeigher,
    ProjectAggregateFilter, StatusFilter,
};

/// Constructor of one registered step.
pub type StepConstructor<R> = fn() -> Box<dyn SchedulerStep<R>>;

/// Name-to-constructor registry for one scheduling domain.
pub struct StepRegistry<R: PlacementRequest + 'static> {
    constructors: HashMap<&'static str, StepConstructor<R>>,
}

impl<R: PlacementRequest + 'static> StepRegistry<R> {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers a constructor under a stable name.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the name is already taken.
    pub fn register(&mut self, name: &'static str, constructor: StepConstructor<R>) -> Result<(), SchedulerError> {
        if self.constructors.insert(name, constructor).is_some() {
            return Err(SchedulerError::invalid_config(format!(
                "step {} is registered twice",
                name
            )));
        }
        Ok(())
    }

    /// Instantiates a fresh, uninitialized step.
    ///
    /// # Errors
    ///
    /// `UnknownStep` when no constructor carries the name.
    pub fn create(&self, name: &str) -> Result<Box<dyn SchedulerStep<R>>, SchedulerError> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| SchedulerError::UnknownStep(name.to_string()))
    }

    /// Registered step names, for diagnostics.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<R: PlacementRequest + 'static> Default for StepRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Steps every scheduling domain supports.
fn register_common<R: PlacementRequest + 'static>(registry: &mut StepRegistry<R>) -> Result<(), SchedulerError> {
    registry.register("host_instructions", || Box::new(HostInstructionFilter::<R>::new()))?;
    registry.register("project_aggregates", || Box::new(ProjectAggregateFilter::<R>::new()))?;
    registry.register("avoid_overloaded_cpu", || Box::new(OverloadedHostWeigher::<R>::cpu()))?;
    registry.register("avoid_overloaded_memory", || Box::new(OverloadedHostWeigher::<R>::memory()))?;
    registry.register("anti_affinity_noisy_projects", || Box::new(NoisyProjectWeigher::<R>::new()))?;
    registry.register("avoid_contended_hosts", || Box::new(ContentionWeigher::<R>::new()))?;
    Ok(())
}

/// The compute (Nova) registry: common steps plus the compute-specific
/// status filter and binpacking weigher.
pub fn compute_registry() -> Result<StepRegistry<ComputeRequest>, SchedulerError> {
    let mut registry = StepRegistry::new();
    register_common(&mut registry)?;
    registry.register("status_filter", || Box::new(StatusFilter::new()))?;
    registry.register("binpacking", || Box::new(BinpackingWeigher::new()))?;
    Ok(registry)
}

/// The share (Manila) registry.
pub fn share_registry() -> Result<StepRegistry<ShareRequest>, SchedulerError> {
    let mut registry = StepRegistry::new();
    register_common(&mut registry)?;
    Ok(registry)
}

/// The block storage (Cinder) registry.
pub fn volume_registry() -> Result<StepRegistry<VolumeRequest>, SchedulerError> {
    let mut registry = StepRegistry::new();
    register_common(&mut registry)?;
    Ok(registry)
}

/// The machine pool registry.
pub fn machine_registry() -> Result<StepRegistry<MachineRequest>, SchedulerError> {
    let mut registry = StepRegistry::new();
    register_common(&mut registry)?;
    Ok(registry)
}

/// The pod registry.
pub fn pod_registry() -> Result<StepRegistry<PodRequest>, SchedulerError> {
    let mut registry = StepRegistry::new();
    register_common(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_registry_has_all_steps() {
        let registry = compute_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "anti_affinity_noisy_projects",
                "avoid_contended_hosts",
                "avoid_overloaded_cpu",
                "avoid_overloaded_memory",
                "binpacking",
                "host_instructions",
                "project_aggregates",
                "status_filter",
            ]
        );
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let registry = share_registry().unwrap();
        let err = registry.create("no_such_step").unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownStep(_)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = StepRegistry::<PodRequest>::new();
        registry
            .register("avoid_contended_hosts", || Box::new(ContentionWeigher::new()))
            .unwrap();
        assert!(registry
            .register("avoid_contended_hosts", || Box::new(ContentionWeigher::new()))
            .is_err());
    }
}
