// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects of the scheduling domain: immutable, self-validating,
//! identity-free. Activations, scaling bounds, intents, and migration
//! histories all live here.

pub mod activation;
pub mod intent;
pub mod migration_history;
pub mod scale;
pub mod step_options;

pub use activation::{ActivationFunction, PipelineResult, StepResult, StepStatistics, StepTraceRecord};
pub use intent::{FlavorClass, HypervisorType, VmIntent};
pub use migration_history::{MigrationHistory, MigrationHop};
pub use scale::{scale, MinMaxScale};
pub use step_options::StepOptions;
