// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities of the scheduling domain: the per-domain placement requests,
//! pipeline configurations, and descheduling decision records.

pub mod compute_request;
pub mod decision;
pub mod machine_request;
pub mod pipeline_config;
pub mod placement_request;
pub mod storage_request;

pub use compute_request::{ComputeFlags, ComputeRequest, ComputeSpec, Flavor};
pub use decision::{DeschedulingDecision, MoveOutcome};
pub use machine_request::{MachineRequest, MachineSpec, PodRequest, PodSpec};
pub use pipeline_config::{PipelineConfig, StepConfig};
pub use placement_request::{HostCandidate, HostInstructions, PlacementRequest};
pub use storage_request::{ShareRequest, ShareSpec, VolumeRequest, VolumeSpec};
