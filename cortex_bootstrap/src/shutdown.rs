// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Graceful shutdown for the Cortex daemons, built around two pieces:
//!
//! - a [`CancellationToken`] backed by a watch channel: long operations
//!   (a pipeline between steps, the extractor loop between runs, the
//!   descheduler between workloads) observe it and exit at their next
//!   safe boundary;
//! - a drain ledger of named subsystems: every daemon loop registers
//!   itself ([`ShutdownCoordinator::register`]) and holds the returned
//!   [`SubsystemHandle`] while it runs. Dropping the handle marks the
//!   subsystem drained, so the coordinator can report *which* subsystem
//!   is still busy when the grace period runs out instead of a bare
//!   timeout.
//!
//! ## Usage
//!
//! ```rust
//! use cortex_bootstrap::shutdown::ShutdownCoordinator;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
//!
//!     let worker = coordinator.register("extractor-runtime");
//!     tokio::spawn(async move {
//!         let token = worker.token();
//!         tokio::select! {
//!             _ = token.cancelled() => { /* drain pending work */ }
//!             _ = tokio::time::sleep(Duration::from_secs(1)) => { /* work */ }
//!         }
//!         // Dropping `worker` marks the subsystem drained.
//!         drop(worker);
//!     });
//!
//!     coordinator.initiate_shutdown();
//!     coordinator.wait_for_drain().await;
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Default grace period for graceful shutdown (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// Cancellation token for signaling shutdown
///
/// Clone-able observer of the coordinator's stop flag. Once the flag is
/// set it never clears; a token created after shutdown began reports
/// cancelled immediately.
#[derive(Clone)]
pub struct CancellationToken {
    state: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Check if cancelled (non-blocking)
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait for cancellation (async)
    pub async fn cancelled(&self) {
        let mut state = self.state.clone();
        // A closed channel means the coordinator is gone, which is as
        // final as an explicit cancel.
        let _ = state.wait_for(|stop| *stop).await;
    }
}

/// Which named subsystems are still running, with a wakeup for waiters.
///
/// Names may be registered more than once (two KPI loops, say); the
/// ledger counts and only forgets a name once every holder is gone.
struct DrainLedger {
    active: Mutex<BTreeMap<&'static str, usize>>,
    changed: Notify,
}

impl DrainLedger {
    fn new() -> Self {
        Self {
            active: Mutex::new(BTreeMap::new()),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<&'static str, usize>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn enter(&self, name: &'static str) {
        *self.lock().entry(name).or_insert(0) += 1;
    }

    fn leave(&self, name: &'static str) {
        {
            let mut active = self.lock();
            if let Some(count) = active.get_mut(name) {
                *count -= 1;
                if *count == 0 {
                    active.remove(name);
                }
            }
        }
        self.changed.notify_waiters();
    }

    fn remaining(&self) -> Vec<&'static str> {
        self.lock().keys().copied().collect()
    }
}

/// Registration of one running subsystem.
///
/// Hold it for the lifetime of the daemon loop; dropping it tells the
/// coordinator the subsystem has drained.
pub struct SubsystemHandle {
    name: &'static str,
    ledger: Arc<DrainLedger>,
    token: CancellationToken,
}

impl SubsystemHandle {
    /// The registered subsystem name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A cancellation token scoped to this process's shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for SubsystemHandle {
    fn drop(&mut self) {
        self.ledger.leave(self.name);
        tracing::debug!(subsystem = self.name, "subsystem drained");
    }
}

/// Shutdown coordinator
///
/// Owns the stop flag and the drain ledger. One per process; clones
/// share both.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    stop: Arc<watch::Sender<bool>>,
    ledger: Arc<DrainLedger>,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    ///
    /// # Arguments
    ///
    /// * `grace_period` - Maximum time [`Self::wait_for_drain`] waits for
    ///   registered subsystems before giving up
    pub fn new(grace_period: Duration) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
            ledger: Arc::new(DrainLedger::new()),
            grace_period,
        }
    }

    /// Get a cancellation token
    ///
    /// Tokens can be cloned and passed to async tasks for shutdown signaling.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: self.stop.subscribe(),
        }
    }

    /// Registers a named subsystem and hands back its drain handle.
    ///
    /// Called by each daemon loop at startup. Registration during
    /// shutdown is allowed; the handle's token is already cancelled.
    pub fn register(&self, name: &'static str) -> SubsystemHandle {
        self.ledger.enter(name);
        SubsystemHandle {
            name,
            ledger: self.ledger.clone(),
            token: self.token(),
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        *self.stop.borrow()
    }

    /// Initiate graceful shutdown
    ///
    /// Sets the stop flag once (repeat calls are no-ops) and logs which
    /// subsystems are expected to drain.
    pub fn initiate_shutdown(&self) {
        if self.stop.send_replace(true) {
            return;
        }
        let draining = self.ledger.remaining();
        if draining.is_empty() {
            tracing::info!("shutdown initiated; no subsystems registered");
        } else {
            tracing::info!(
                grace_period = ?self.grace_period,
                "shutdown initiated; draining {}",
                draining.join(", ")
            );
        }
    }

    /// Wait until every registered subsystem has drained
    ///
    /// Returns `true` if the ledger emptied within the grace period,
    /// `false` otherwise. On timeout the still-draining subsystems are
    /// named in the log, so a stuck extractor is distinguishable from a
    /// stuck API server.
    pub async fn wait_for_drain(&self) -> bool {
        let deadline = tokio::time::Instant::now() + self.grace_period;
        loop {
            // Arm the wakeup before checking, so a subsystem draining
            // between the check and the await is not missed.
            let notified = self.ledger.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.ledger.remaining().is_empty() {
                tracing::info!("all subsystems drained");
                return true;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let stuck = self.ledger.remaining();
                    tracing::warn!(
                        "shutdown grace period elapsed; still draining: {}",
                        stuck.join(", ")
                    );
                    return false;
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_starts_uncancelled() {
        let coordinator = ShutdownCoordinator::default();
        assert!(!coordinator.token().is_cancelled());
        assert!(!coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn test_initiate_shutdown_cancels_tokens() {
        let coordinator = ShutdownCoordinator::default();
        let token = coordinator.token();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown(); // repeat calls are no-ops

        assert!(coordinator.is_shutting_down());
        assert!(token.is_cancelled());
        // cancelled() resolves immediately on an already-cancelled token
        token.cancelled().await;
    }

    #[tokio::test]
    async fn test_token_issued_after_shutdown_is_cancelled() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.initiate_shutdown();
        assert!(coordinator.token().is_cancelled());
        assert!(coordinator.register("late-subsystem").token().is_cancelled());
    }

    #[tokio::test]
    async fn test_drain_completes_when_handles_drop() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let api = coordinator.register("scheduler-api");
        let extractor = coordinator.register("extractor-runtime");

        coordinator.initiate_shutdown();

        let waiter = coordinator.clone();
        let drained = tokio::spawn(async move { waiter.wait_for_drain().await });

        drop(api);
        drop(extractor);

        assert!(tokio::time::timeout(Duration::from_secs(1), drained)
            .await
            .expect("drain resolved")
            .unwrap());
    }

    #[tokio::test]
    async fn test_straggler_times_out() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(20));
        let _stuck = coordinator.register("descheduler");

        coordinator.initiate_shutdown();
        assert!(!coordinator.wait_for_drain().await);
    }

    #[tokio::test]
    async fn test_same_name_registered_twice_drains_once_both_drop() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
        let first = coordinator.register("kpi-sampler");
        let second = coordinator.register("kpi-sampler");

        drop(first);
        // One holder remains; the name must still be draining.
        assert!(!coordinator.wait_for_drain().await);

        drop(second);
        assert!(coordinator.wait_for_drain().await);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_registered_is_immediate() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        coordinator.initiate_shutdown();
        assert!(coordinator.wait_for_drain().await);
    }

    #[tokio::test]
    async fn test_token_wakes_waiting_task() {
        let coordinator = ShutdownCoordinator::default();
        let token = coordinator.token();
        let waiter = tokio::spawn(async move { token.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("woke up")
            .unwrap();
    }
}
