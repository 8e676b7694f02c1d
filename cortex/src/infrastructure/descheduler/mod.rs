// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete descheduler plumbing: decision steps and the compute-backed
//! workload mover.

pub mod decision_steps;
pub mod nova_mover;

pub use decision_steps::{DrainContendedHostsStep, DrainOverloadedHostsStep};
pub use nova_mover::NovaWorkloadMover;
