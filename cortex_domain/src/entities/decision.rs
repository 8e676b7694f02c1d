// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduling Decisions
//!
//! The audit record the descheduler executor writes per workload it
//! touched, and the per-workload move state machine it drives:
//!
//! ```text
//! Selected -> Issued -> Observed-Migrating -> Observed-Stable(new host)   success
//!                                          -> Observed-Stable(old host)   no-op
//!                                          -> TimedOut                    fatal for this workload
//!                       APIError                                          fatal for this workload
//! ```
//!
//! Decisions feed the cycle detector (together with the migration
//! history) so a workload that keeps bouncing is left alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one attempted workload move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// The workload settled on a different host.
    Moved { from: String, to: String },
    /// The workload returned to a stable state on its original host.
    StayedPut { host: String },
    /// The workload never settled within the caller-supplied timeout.
    TimedOut,
    /// The move API rejected or failed the request.
    ApiError { message: String },
    /// Dry-run mode: intent was logged, no API call was made.
    DryRun,
    /// Dropped before execution (e.g. by the cycle detector).
    Skipped { reason: String },
}

/// Audit record of one descheduling decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeschedulingDecision {
    /// Workload the decision concerns.
    pub workload_id: String,
    /// Decision step that proposed the workload.
    pub step_name: String,
    /// When the decision was taken.
    pub decided_at: DateTime<Utc>,
    /// Whether the executor actually issued a move API call.
    pub executed: bool,
    /// Terminal outcome.
    pub outcome: MoveOutcome,
}

impl DeschedulingDecision {
    pub fn new(
        workload_id: impl Into<String>,
        step_name: impl Into<String>,
        executed: bool,
        outcome: MoveOutcome,
    ) -> Self {
        Self {
            workload_id: workload_id.into(),
            step_name: step_name.into(),
            decided_at: Utc::now(),
            executed,
            outcome,
        }
    }

    /// True when the move completed on a new host.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, MoveOutcome::Moved { .. })
    }
}
