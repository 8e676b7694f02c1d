// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compute Scheduling Request
//!
//! The Nova-facing request variant. Besides the candidate hosts and seed
//! weights every domain carries, a compute request has a flavor (the
//! resource ask), the requesting project, scheduler hints, and typed flags
//! for the operations Nova delegates besides plain creation: rebuild,
//! resize, live migration, evacuation, reservations, and VMware-backed
//! placements.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::placement_request::{HostCandidate, HostInstructions, PlacementRequest};
use crate::error::SchedulerError;
use crate::value_objects::intent::{FlavorClass, HypervisorType, VmIntent};

/// Resource ask of the VM being placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub memory_mb: u64,
    pub vcpus: u64,
    pub root_disk_gb: u64,
    #[serde(default)]
    pub extra_specs: HashMap<String, String>,
}

impl Flavor {
    /// Hypervisor type dispatch key; see
    /// [`HypervisorType::from_extra_specs`].
    pub fn hypervisor_type(&self) -> Result<HypervisorType, SchedulerError> {
        HypervisorType::from_extra_specs(&self.extra_specs)
    }

    /// Workload class dispatch key; see
    /// [`FlavorClass::from_extra_specs`].
    pub fn flavor_class(&self) -> Result<FlavorClass, SchedulerError> {
        FlavorClass::from_extra_specs(&self.extra_specs)
    }
}

/// Domain-specific spec of a compute request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeSpec {
    pub flavor: Flavor,
    pub project_id: String,
    #[serde(default = "default_num_instances")]
    pub num_instances: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub scheduler_hints: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_meta: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_hosts: Option<Vec<String>>,
}

fn default_num_instances() -> u32 {
    1
}

/// Typed flags for the operation being delegated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeFlags {
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default)]
    pub resize: bool,
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub vmware: bool,
    #[serde(default)]
    pub reservation: bool,
}

/// A compute placement request as handed to the scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub request_id: String,
    pub spec: ComputeSpec,
    pub flags: ComputeFlags,
    pub candidates: Vec<HostCandidate>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl ComputeRequest {
    /// The scheduling intent derived from the scheduler hints.
    pub fn intent(&self) -> Result<VmIntent, SchedulerError> {
        VmIntent::from_scheduler_hints(&self.spec.scheduler_hints)
    }
}

impl PlacementRequest for ComputeRequest {
    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn candidates(&self) -> &[HostCandidate] {
        &self.candidates
    }

    fn seed_weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    fn pipeline_override(&self) -> Option<&str> {
        self.pipeline.as_deref()
    }

    fn project_id(&self) -> Option<&str> {
        Some(&self.spec.project_id)
    }

    fn host_instructions(&self) -> HostInstructions {
        HostInstructions {
            force_hosts: self.spec.force_hosts.clone(),
            ignore_hosts: self.spec.ignore_hosts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn flavor(memory_mb: u64, vcpus: u64, root_disk_gb: u64) -> Flavor {
        Flavor {
            id: "f-1".to_string(),
            name: Some("m1.test".to_string()),
            memory_mb,
            vcpus,
            root_disk_gb,
            extra_specs: HashMap::new(),
        }
    }

    fn request_with_hints(hints: HashMap<String, serde_json::Value>) -> ComputeRequest {
        ComputeRequest {
            request_id: "req-42".to_string(),
            spec: ComputeSpec {
                flavor: flavor(2048, 2, 200),
                project_id: "p-1".to_string(),
                num_instances: 1,
                availability_zone: None,
                scheduler_hints: hints,
                image_meta: None,
                force_hosts: None,
                ignore_hosts: None,
            },
            flags: ComputeFlags::default(),
            candidates: vec![HostCandidate::new("h1")],
            weights: HashMap::new(),
            pipeline: None,
        }
    }

    #[test]
    fn test_intent_derived_from_hints() {
        let mut hints = HashMap::new();
        hints.insert("_nova_check_type".to_string(), json!(["live_migrate"]));
        assert_eq!(request_with_hints(hints).intent().unwrap(), VmIntent::LiveMigrate);
    }

    #[test]
    fn test_intent_bad_hint_type_is_error() {
        let mut hints = HashMap::new();
        hints.insert("_nova_check_type".to_string(), json!(123));
        assert!(request_with_hints(hints).intent().is_err());
    }

    #[test]
    fn test_host_instructions_come_from_spec() {
        let mut request = request_with_hints(HashMap::new());
        request.spec.force_hosts = Some(vec!["h1".to_string()]);
        let instructions = request.host_instructions();
        assert_eq!(instructions.force_hosts, Some(vec!["h1".to_string()]));
        assert!(instructions.ignore_hosts.is_none());
    }

    #[test]
    fn test_request_exposes_project() {
        let request = request_with_hints(HashMap::new());
        assert_eq!(request.project_id(), Some("p-1"));
    }
}
