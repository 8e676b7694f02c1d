// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduler Pipeline
//!
//! Corrects known-bad placements on a timer. One cycle:
//!
//! 1. Run every decision step; union the proposed workload IDs (the
//!    first proposing step gets the attribution). A failing step is
//!    logged and the cycle continues.
//! 2. The cycle detector drops any workload whose recent migration
//!    history revisits a host (thrash protection).
//! 3. The executor processes survivors strictly serially: issue the move,
//!    poll the workload state until it settles on another host, returns
//!    to its origin, times out, or the API fails. Each outcome is
//!    recorded as a decision; successful moves also append a migration
//!    hop for the next cycle's detector.
//!
//! Exactly one cycle runs at a time (per-pipeline mutex). Dry-run mode
//! logs intent and records the decision without touching the API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use cortex_bootstrap::CancellationToken;
use cortex_domain::repositories::DecisionRepository;
use cortex_domain::services::{DecisionStep, WorkloadMover, WorkloadState};
use cortex_domain::{DeschedulingDecision, MoveOutcome, SchedulerError};

use crate::infrastructure::metrics::MetricsService;

/// Tuning of one descheduler pipeline.
#[derive(Debug, Clone)]
pub struct DeschedulerOptions {
    /// Delay between cycles.
    pub interval: Duration,
    /// Log intent without issuing moves.
    pub dry_run: bool,
    /// Per-workload settle timeout.
    pub workload_timeout: Duration,
    /// Recent hops the cycle detector inspects.
    pub history_window: usize,
    /// Delay between state polls while a move settles.
    pub poll_interval: Duration,
}

impl Default for DeschedulerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            dry_run: true,
            workload_timeout: Duration::from_secs(300),
            history_window: 8,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Counters summarizing one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub proposed: usize,
    pub dropped_cycles: usize,
    pub moved: usize,
    pub stayed: usize,
    pub failed: usize,
    pub dry_run: usize,
}

/// Drops workloads whose migration history already revisits a host.
pub struct CycleDetector {
    repository: Arc<dyn DecisionRepository>,
    window: usize,
}

impl CycleDetector {
    pub fn new(repository: Arc<dyn DecisionRepository>, window: usize) -> Self {
        Self { repository, window }
    }

    /// True when the workload must be left alone.
    pub async fn is_thrashing(&self, workload_id: &str) -> Result<bool, SchedulerError> {
        let history = self.repository.migration_history(workload_id, self.window).await?;
        Ok(history.has_cycle())
    }
}

/// The timer-driven descheduling pipeline.
pub struct DeschedulerPipeline {
    steps: Vec<Box<dyn DecisionStep>>,
    mover: Arc<dyn WorkloadMover>,
    repository: Arc<dyn DecisionRepository>,
    detector: CycleDetector,
    options: DeschedulerOptions,
    metrics: Option<Arc<MetricsService>>,
    cycle_gate: Mutex<()>,
}

impl DeschedulerPipeline {
    pub fn new(
        steps: Vec<Box<dyn DecisionStep>>,
        mover: Arc<dyn WorkloadMover>,
        repository: Arc<dyn DecisionRepository>,
        options: DeschedulerOptions,
        metrics: Option<Arc<MetricsService>>,
    ) -> Self {
        let detector = CycleDetector::new(repository.clone(), options.history_window);
        Self {
            steps,
            mover,
            repository,
            detector,
            options,
            metrics,
            cycle_gate: Mutex::new(()),
        }
    }

    /// Runs cycles on the configured interval until cancelled.
    pub async fn run_forever(&self, token: CancellationToken) {
        loop {
            match self.run_cycle().await {
                Ok(summary) => info!(?summary, "descheduling cycle complete"),
                Err(e) => warn!("descheduling cycle failed: {}", e),
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }
    }

    /// Runs exactly one cycle. Serialized by the per-pipeline mutex.
    pub async fn run_cycle(&self) -> Result<CycleSummary, SchedulerError> {
        let _gate = self.cycle_gate.lock().await;
        let mut summary = CycleSummary::default();

        // Union of step proposals; first proposer wins the attribution.
        let mut proposals: BTreeMap<String, &'static str> = BTreeMap::new();
        for step in &self.steps {
            match step.run().await {
                Ok(workloads) => {
                    for workload in workloads {
                        proposals.entry(workload).or_insert_with(|| step.name());
                    }
                }
                Err(e) => warn!(step = step.name(), "decision step failed: {}", e),
            }
        }
        summary.proposed = proposals.len();

        for (workload, step_name) in proposals {
            if self.detector.is_thrashing(&workload).await? {
                info!(%workload, "dropping workload with cyclic migration history");
                summary.dropped_cycles += 1;
                self.record(DeschedulingDecision::new(
                    &workload,
                    step_name,
                    false,
                    MoveOutcome::Skipped {
                        reason: "migration cycle detected".to_string(),
                    },
                ))
                .await;
                continue;
            }

            // Workloads are processed strictly serially to avoid
            // overbooking the target hosts.
            let decision = self.execute_move(&workload, step_name).await;
            match &decision.outcome {
                MoveOutcome::Moved { .. } => summary.moved += 1,
                MoveOutcome::StayedPut { .. } => summary.stayed += 1,
                MoveOutcome::DryRun => summary.dry_run += 1,
                MoveOutcome::TimedOut | MoveOutcome::ApiError { .. } => summary.failed += 1,
                MoveOutcome::Skipped { .. } => summary.dropped_cycles += 1,
            }
            self.record(decision).await;
        }

        Ok(summary)
    }

    async fn execute_move(&self, workload: &str, step_name: &'static str) -> DeschedulingDecision {
        if self.options.dry_run {
            info!(workload, step = step_name, "dry run: would move workload");
            return DeschedulingDecision::new(workload, step_name, false, MoveOutcome::DryRun);
        }

        let origin = match self.mover.state(workload).await {
            Ok(WorkloadState::Stable { host }) => host,
            Ok(other) => {
                return DeschedulingDecision::new(
                    workload,
                    step_name,
                    false,
                    MoveOutcome::Skipped {
                        reason: format!("workload is not in a stable state: {:?}", other),
                    },
                );
            }
            Err(e) => {
                return DeschedulingDecision::new(
                    workload,
                    step_name,
                    false,
                    MoveOutcome::ApiError { message: e.to_string() },
                );
            }
        };

        if let Err(e) = self.mover.issue_move(workload).await {
            return DeschedulingDecision::new(
                workload,
                step_name,
                true,
                MoveOutcome::ApiError { message: e.to_string() },
            );
        }

        let outcome = self.await_settled(workload, &origin).await;
        if let MoveOutcome::Moved { from, to } = &outcome {
            if let Err(e) = self.repository.record_migration(workload, from, to).await {
                warn!(workload, "failed to record migration hop: {}", e);
            }
        }
        DeschedulingDecision::new(workload, step_name, true, outcome)
    }

    /// Polls the workload until the move settles.
    ///
    /// A move settles only after the transient migrating state has been
    /// observed and the workload reports stable again: on another host it
    /// moved, on the origin it stayed put. A stable report before the
    /// transient has been observed never confirms anything, whichever
    /// host it names; a workload that never shows the transient within
    /// the timeout is fatal for this cycle entry.
    async fn await_settled(&self, workload: &str, origin: &str) -> MoveOutcome {
        let deadline = Instant::now() + self.options.workload_timeout;
        let mut observed_migrating = false;

        loop {
            if Instant::now() >= deadline {
                return MoveOutcome::TimedOut;
            }
            match self.mover.state(workload).await {
                Ok(WorkloadState::Migrating) => observed_migrating = true,
                Ok(WorkloadState::Stable { host }) if observed_migrating => {
                    if host != origin {
                        return MoveOutcome::Moved {
                            from: origin.to_string(),
                            to: host,
                        };
                    }
                    return MoveOutcome::StayedPut { host };
                }
                // The transient has not been observed yet; keep polling.
                Ok(WorkloadState::Stable { .. }) => {}
                Ok(WorkloadState::Other(_)) => {}
                Err(e) => return MoveOutcome::ApiError { message: e.to_string() },
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    async fn record(&self, decision: DeschedulingDecision) {
        if let Some(metrics) = &self.metrics {
            let outcome = match &decision.outcome {
                MoveOutcome::Moved { .. } => "moved",
                MoveOutcome::StayedPut { .. } => "stayed",
                MoveOutcome::TimedOut => "timed_out",
                MoveOutcome::ApiError { .. } => "api_error",
                MoveOutcome::DryRun => "dry_run",
                MoveOutcome::Skipped { .. } => "skipped",
            };
            metrics.descheduler_moves_total.with_label_values(&[outcome]).inc();
        }
        if let Err(e) = self.repository.record_decision(&decision).await {
            warn!(workload = %decision.workload_id, "failed to record decision: {}", e);
        }
    }
}
