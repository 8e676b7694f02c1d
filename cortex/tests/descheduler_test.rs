// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduler Tests
//!
//! Cycle detection, dry-run, the per-workload move state machine, and
//! serial execution against a scripted mover.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cortex::application::services::{CycleDetector, DeschedulerOptions, DeschedulerPipeline};
use cortex::infrastructure::repositories::{schema, SqliteDecisionStore};
use cortex_domain::repositories::DecisionRepository;
use cortex_domain::services::{DecisionStep, WorkloadMover, WorkloadState};
use cortex_domain::{MoveOutcome, SchedulerError, StepOptions};
use sqlx::SqlitePool;

async fn decision_store() -> Arc<SqliteDecisionStore> {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    schema::ensure_schema(&pool).await.unwrap();
    Arc::new(SqliteDecisionStore::new(pool))
}

/// Step proposing a fixed set of workloads.
struct FixedProposals(BTreeSet<String>);

#[async_trait]
impl DecisionStep for FixedProposals {
    fn name(&self) -> &'static str {
        "fixed_proposals"
    }

    async fn init(&mut self, options: StepOptions) -> Result<(), SchedulerError> {
        options.finish()
    }

    async fn run(&self) -> Result<BTreeSet<String>, SchedulerError> {
        Ok(self.0.clone())
    }
}

fn proposals(ids: &[&str]) -> Box<dyn DecisionStep> {
    Box::new(FixedProposals(ids.iter().map(|s| s.to_string()).collect()))
}

/// Scripted mover: plays a fixed state sequence per poll and records
/// every issued move.
#[derive(Default)]
struct ScriptedMover {
    states: Mutex<Vec<WorkloadState>>,
    issued: Mutex<Vec<String>>,
    in_flight: Mutex<usize>,
    max_in_flight: Mutex<usize>,
}

impl ScriptedMover {
    fn with_states(states: Vec<WorkloadState>) -> Self {
        Self {
            states: Mutex::new(states),
            ..Default::default()
        }
    }

    fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl WorkloadMover for ScriptedMover {
    async fn issue_move(&self, workload_id: &str) -> Result<(), SchedulerError> {
        {
            let mut in_flight = self.in_flight.lock();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock();
            *max = (*max).max(*in_flight);
        }
        self.issued.lock().push(workload_id.to_string());
        Ok(())
    }

    async fn state(&self, _workload_id: &str) -> Result<WorkloadState, SchedulerError> {
        let mut states = self.states.lock();
        let state = if states.len() > 1 {
            states.remove(0)
        } else {
            states
                .first()
                .cloned()
                .unwrap_or(WorkloadState::Other("unknown".to_string()))
        };
        if matches!(state, WorkloadState::Stable { .. }) {
            let mut in_flight = self.in_flight.lock();
            *in_flight = in_flight.saturating_sub(1);
        }
        Ok(state)
    }
}

fn options(dry_run: bool) -> DeschedulerOptions {
    DeschedulerOptions {
        interval: Duration::from_secs(3600),
        dry_run,
        workload_timeout: Duration::from_millis(300),
        history_window: 8,
        poll_interval: Duration::from_millis(5),
    }
}

/// Seeded scenario: W with history h1->h2, h2->h1 is dropped; W' with
/// h1->h2->h3 is retained.
#[tokio::test]
async fn test_cycle_detector_drops_round_trips() {
    let store = decision_store().await;
    store.record_migration("W", "h1", "h2").await.unwrap();
    store.record_migration("W", "h2", "h1").await.unwrap();
    store.record_migration("W2", "h1", "h2").await.unwrap();
    store.record_migration("W2", "h2", "h3").await.unwrap();

    let detector = CycleDetector::new(store.clone(), 8);
    assert!(detector.is_thrashing("W").await.unwrap());
    assert!(!detector.is_thrashing("W2").await.unwrap());
}

#[tokio::test]
async fn test_cycle_is_dropped_before_execution() {
    let store = decision_store().await;
    store.record_migration("W", "h1", "h2").await.unwrap();
    store.record_migration("W", "h2", "h1").await.unwrap();

    let mover = Arc::new(ScriptedMover::with_states(vec![WorkloadState::Stable {
        host: "h1".to_string(),
    }]));
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["W"])],
        mover.clone(),
        store.clone(),
        options(false),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.dropped_cycles, 1);
    assert_eq!(summary.moved, 0);
    // The executor never touched the API.
    assert!(mover.issued().is_empty());

    let decisions = store.recent_decisions(10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert!(matches!(decisions[0].outcome, MoveOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_dry_run_records_without_api_calls() {
    let store = decision_store().await;
    let mover = Arc::new(ScriptedMover::default());
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1", "vm-2"])],
        mover.clone(),
        store.clone(),
        options(true),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.dry_run, 2);
    assert!(mover.issued().is_empty());

    let decisions = store.recent_decisions(10).await.unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(decisions.iter().all(|d| !d.executed));
}

#[tokio::test]
async fn test_successful_move_settles_on_new_host() {
    let store = decision_store().await;
    // Stable on origin, then migrating, then stable elsewhere.
    let mover = Arc::new(ScriptedMover::with_states(vec![
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Migrating,
        WorkloadState::Stable { host: "h2".to_string() },
    ]));
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1"])],
        mover.clone(),
        store.clone(),
        options(false),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.moved, 1);
    assert_eq!(mover.issued(), vec!["vm-1"]);

    // The migration hop is recorded for the next cycle's detector.
    let history = store.migration_history("vm-1", 8).await.unwrap();
    assert_eq!(history.hops.len(), 1);
    assert_eq!(history.hops[0].dest_host, "h2");
}

#[tokio::test]
async fn test_move_back_to_origin_is_a_noop() {
    let store = decision_store().await;
    let mover = Arc::new(ScriptedMover::with_states(vec![
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Migrating,
        WorkloadState::Stable { host: "h1".to_string() },
    ]));
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1"])],
        mover,
        store.clone(),
        options(false),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.stayed, 1);
    assert!(store.migration_history("vm-1", 8).await.unwrap().hops.is_empty());
}

/// The executor requires the transient migrating observation: a workload
/// that reappears stable on another host without the transient ever
/// being seen is not a confirmed move and fails this cycle entry.
#[tokio::test]
async fn test_unobserved_transient_is_not_a_confirmed_move() {
    let store = decision_store().await;
    // Stable on the origin, then stable elsewhere, never migrating.
    let mover = Arc::new(ScriptedMover::with_states(vec![
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Stable { host: "h2".to_string() },
    ]));
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1"])],
        mover,
        store.clone(),
        options(false),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.moved, 0);
    assert_eq!(summary.failed, 1);

    let decisions = store.recent_decisions(10).await.unwrap();
    assert!(matches!(decisions[0].outcome, MoveOutcome::TimedOut));
    // No migration hop without a confirmed move.
    assert!(store.migration_history("vm-1", 8).await.unwrap().hops.is_empty());
}

#[tokio::test]
async fn test_never_settling_workload_times_out() {
    let store = decision_store().await;
    let mover = Arc::new(ScriptedMover::with_states(vec![
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Migrating,
    ]));
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1"])],
        mover,
        store.clone(),
        options(false),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.failed, 1);

    let decisions = store.recent_decisions(10).await.unwrap();
    assert!(matches!(decisions[0].outcome, MoveOutcome::TimedOut));
}

#[tokio::test]
async fn test_workloads_are_processed_serially() {
    let store = decision_store().await;
    // Every workload: stable origin, migrating, stable on a new host.
    let mover = Arc::new(ScriptedMover::with_states(vec![
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Migrating,
        WorkloadState::Stable { host: "h9".to_string() },
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Migrating,
        WorkloadState::Stable { host: "h9".to_string() },
        WorkloadState::Stable { host: "h1".to_string() },
        WorkloadState::Migrating,
        WorkloadState::Stable { host: "h9".to_string() },
    ]));
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1", "vm-2", "vm-3"])],
        mover.clone(),
        store,
        options(false),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.moved, 3);
    assert_eq!(*mover.max_in_flight.lock(), 1);
}

#[tokio::test]
async fn test_union_of_steps_deduplicates_proposals() {
    let store = decision_store().await;
    let mover = Arc::new(ScriptedMover::default());
    let pipeline = DeschedulerPipeline::new(
        vec![proposals(&["vm-1", "vm-2"]), proposals(&["vm-2", "vm-3"])],
        mover,
        store,
        options(true),
        None,
    );

    let summary = pipeline.run_cycle().await.unwrap();
    assert_eq!(summary.proposed, 3);
}
