// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Machine and Pod Scheduling Requests
//!
//! The machine-provisioning controller delegates pool selection, and the
//! pod variant covers node selection. The host key is the pool name
//! respectively the node name; the pipeline treats both as opaque.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::placement_request::{HostCandidate, PlacementRequest};

/// Spec of a machine provisioning placement across machine pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    /// Machine class or size requested, opaque to the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_class: Option<String>,
    /// Pools the controller considers, mirroring the candidate list.
    #[serde(default)]
    pub pools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

/// A machine placement request as handed to the scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<MachineSpec>,
    pub candidates: Vec<HostCandidate>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl PlacementRequest for MachineRequest {
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
}

/// Spec of a pod placement across nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request_mb: Option<u64>,
}

/// A pod placement request as handed to the scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PodSpec>,
    pub candidates: Vec<HostCandidate>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl PlacementRequest for PodRequest {
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
}
