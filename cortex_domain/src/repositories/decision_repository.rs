// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Decision Repository Port
//!
//! Persistence for descheduling decisions and the migration history the
//! cycle detector inspects. The store is single-writer (the executor),
//! multi-reader (the detector and any audit surface).

use async_trait::async_trait;

use crate::entities::decision::DeschedulingDecision;
use crate::error::SchedulerError;
use crate::value_objects::migration_history::MigrationHistory;

/// Persistence port for the descheduler.
#[async_trait]
pub trait DecisionRepository: Send + Sync {
    /// Appends one decision record.
    async fn record_decision(&self, decision: &DeschedulingDecision) -> Result<(), SchedulerError>;

    /// Appends one observed migration hop for a workload.
    async fn record_migration(
        &self,
        workload_id: &str,
        source_host: &str,
        dest_host: &str,
    ) -> Result<(), SchedulerError>;

    /// The most recent migration hops of a workload, oldest first,
    /// bounded by the inspection window.
    async fn migration_history(&self, workload_id: &str, window: usize) -> Result<MigrationHistory, SchedulerError>;

    /// Recent decisions, newest first, for audit surfaces.
    async fn recent_decisions(&self, limit: usize) -> Result<Vec<DeschedulingDecision>, SchedulerError>;
}
