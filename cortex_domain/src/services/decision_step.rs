// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduler Contracts
//!
//! The descheduler pipeline mirrors the scheduling pipeline but its steps
//! return *workload IDs to move* instead of activations. Step results are
//! merged by set union, post-processed by the cycle detector, and handed
//! to a serial executor that drives each move through the workload state
//! machine.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::SchedulerError;
use crate::value_objects::step_options::StepOptions;

/// One decision step of the descheduler pipeline.
#[async_trait]
pub trait DecisionStep: Send + Sync {
    /// Identifier stable in configuration, decisions, and metrics labels.
    fn name(&self) -> &'static str;

    /// Validates options. Called once at pipeline construction.
    async fn init(&mut self, options: StepOptions) -> Result<(), SchedulerError>;

    /// Proposes workloads that should be moved off their current host.
    async fn run(&self) -> Result<BTreeSet<String>, SchedulerError>;
}

/// Observed state of a workload while a move settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadState {
    /// Stable on the given host.
    Stable { host: String },
    /// The transient migrating state.
    Migrating,
    /// Any other reported state (building, error, ...), kept verbatim.
    Other(String),
}

/// Issues move operations and reports workload state.
///
/// The executor is the only caller; it processes workloads serially and
/// polls `state` until the move settles or its timeout expires. In
/// dry-run mode the executor never calls `issue_move`.
#[async_trait]
pub trait WorkloadMover: Send + Sync {
    /// Requests a move of the workload to a host of the platform's
    /// choosing (the target is the scheduler's job, not the mover's).
    async fn issue_move(&self, workload_id: &str) -> Result<(), SchedulerError>;

    /// Reports the currently observed state of the workload.
    async fn state(&self, workload_id: &str) -> Result<WorkloadState, SchedulerError>;
}
