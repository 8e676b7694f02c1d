// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain service contracts: the plugin seams for scheduling steps,
//! feature extractors, descheduler decision steps, and data sources.
//! Concrete implementations live in the infrastructure layer.

pub mod data_source;
pub mod decision_step;
pub mod feature_extractor;
pub mod scheduler_step;

pub use data_source::DataSource;
pub use decision_step::{DecisionStep, WorkloadMover, WorkloadState};
pub use feature_extractor::FeatureExtractor;
pub use scheduler_step::{SchedulerStep, StepTrace};
