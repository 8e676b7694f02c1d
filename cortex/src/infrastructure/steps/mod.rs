// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete scheduling steps.
//!
//! Filters (remove candidates, never reweigh): host instructions, project
//! aggregates, the intent-aware status filter. Weighers (adjust every
//! candidate, never remove): binpacking, overloaded CPU/memory avoidance,
//! noisy-project anti-affinity, contention avoidance.

pub mod binpacking_weigher;
pub mod contention_weigher;
pub mod host_instruction_filter;
pub mod noisy_project_weigher;
pub mod overloaded_host_weigher;
pub mod project_aggregate_filter;
pub mod status_filter;

pub use binpacking_weigher::BinpackingWeigher;
pub use contention_weigher::ContentionWeigher;
pub use host_instruction_filter::HostInstructionFilter;
pub use noisy_project_weigher::NoisyProjectWeigher;
pub use overloaded_host_weigher::OverloadedHostWeigher;
pub use project_aggregate_filter::ProjectAggregateFilter;
pub use status_filter::StatusFilter;
