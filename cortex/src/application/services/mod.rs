// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services: the pipelines and long-running loops that
//! orchestrate domain contracts over the infrastructure.

pub mod descheduler;
pub mod extractor_runtime;
pub mod kpi_service;
pub mod scheduling_pipeline;
pub mod step_registry;
pub mod syncer;

pub use descheduler::{CycleDetector, CycleSummary, DeschedulerOptions, DeschedulerPipeline};
pub use extractor_runtime::ExtractorRuntime;
pub use kpi_service::KpiService;
pub use scheduling_pipeline::SchedulingPipeline;
pub use step_registry::{
    compute_registry, machine_registry, pod_registry, share_registry, volume_registry, StepRegistry,
};
pub use syncer::Syncer;
