// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Storage Scheduling Requests
//!
//! The Manila (share) and Cinder (volume) request variants. Both obey the
//! same weights-cover-hosts contract as compute; their host key is the
//! share host respectively the volume host (a storage pool identifier),
//! and their specs carry the storage-specific ask.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::placement_request::{HostCandidate, PlacementRequest};

/// Spec of a Manila share placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSpec {
    pub project_id: String,
    pub size_gb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_proto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub share_properties: HashMap<String, String>,
}

/// A share placement request as handed to the scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub request_id: String,
    pub spec: ShareSpec,
    pub candidates: Vec<HostCandidate>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl PlacementRequest for ShareRequest {
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
}

/// Spec of a Cinder volume placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub project_id: String,
    pub size_gb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

/// A volume placement request as handed to the scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub request_id: String,
    pub spec: VolumeSpec,
    pub candidates: Vec<HostCandidate>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl PlacementRequest for VolumeRequest {
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
}
