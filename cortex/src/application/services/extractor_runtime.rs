// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Extractor Runtime
//!
//! The long-running pool driving all feature extractors.
//!
//! ## Lifecycle
//!
//! - Startup validates the declared trigger topology for cycles, creates
//!   every table (idempotently), subscribes each extractor to its
//!   triggers, and runs every extractor once unconditionally.
//! - Each extractor then sits in its per-extractor loop:
//!   `Idle -> Running -> Idle`, with a single pending bit. Triggers
//!   arriving while `Running` set the bit; on return the worker runs once
//!   more. A burst of N triggers during one run collapses to exactly one
//!   follow-up.
//! - Runs are serialized per extractor; different extractors run in
//!   parallel, bounded by a semaphore.
//! - On a successful rewrite the extractor's output topic is published;
//!   a failure is logged with the extractor name and retried on the next
//!   trigger without affecting the others.
//! - Shutdown drains the pending bit and exits.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use cortex_bootstrap::CancellationToken;
use cortex_domain::events::TopicGraph;
use cortex_domain::services::FeatureExtractor;
use cortex_domain::SchedulerError;

use crate::infrastructure::messaging::{TriggerBus, TriggerListener};
use crate::infrastructure::metrics::MetricsService;

/// The trigger-driven extractor pool.
pub struct ExtractorRuntime {
    extractors: Vec<Arc<dyn FeatureExtractor>>,
    bus: Arc<dyn TriggerBus>,
    parallelism: usize,
    metrics: Option<Arc<MetricsService>>,
}

impl ExtractorRuntime {
    pub fn new(
        extractors: Vec<Arc<dyn FeatureExtractor>>,
        bus: Arc<dyn TriggerBus>,
        parallelism: usize,
        metrics: Option<Arc<MetricsService>>,
    ) -> Self {
        Self {
            extractors,
            bus,
            parallelism: parallelism.max(1),
            metrics,
        }
    }

    /// Validates the declared subscribe/publish topology.
    pub fn validate_topology(&self) -> Result<(), SchedulerError> {
        let mut graph = TopicGraph::new();
        for extractor in &self.extractors {
            graph.declare(extractor.triggers(), extractor.publishes());
        }
        graph.validate_acyclic()
    }

    /// Runs the pool until the token is cancelled.
    ///
    /// # Errors
    ///
    /// `Fatal` when the topology is cyclic, a table cannot be created, or
    /// a bus subscription fails; startup must abort in all three cases.
    pub async fn run(&self, token: CancellationToken) -> Result<(), SchedulerError> {
        self.validate_topology()?;

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(self.extractors.len());

        for extractor in &self.extractors {
            extractor
                .init()
                .await
                .map_err(|e| SchedulerError::fatal(format!("extractor {} failed to init: {}", extractor.name(), e)))?;

            let topics: Vec<String> = extractor.triggers().iter().map(|t| (*t).to_string()).collect();
            let listener = self
                .bus
                .subscribe(&topics)
                .await
                .map_err(|e| SchedulerError::fatal(format!("failed to subscribe {}: {}", extractor.name(), e)))?;

            let worker = ExtractorWorker {
                extractor: extractor.clone(),
                bus: self.bus.clone(),
                listener,
                semaphore: semaphore.clone(),
                metrics: self.metrics.clone(),
                token: token.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        info!(extractors = handles.len(), "extractor runtime started");
        for handle in handles {
            let _ = handle.await;
        }
        info!("extractor runtime stopped");
        Ok(())
    }
}

struct ExtractorWorker {
    extractor: Arc<dyn FeatureExtractor>,
    bus: Arc<dyn TriggerBus>,
    listener: TriggerListener,
    semaphore: Arc<Semaphore>,
    metrics: Option<Arc<MetricsService>>,
    token: CancellationToken,
}

impl ExtractorWorker {
    async fn run(self) {
        // Initial unconditional run; every feature table gets a first
        // generation even before any source syncs.
        self.run_once().await;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    // Drain the pending bit, then exit.
                    if self.listener.take_pending() {
                        self.run_once().await;
                    }
                    debug!(extractor = self.extractor.name(), "extractor worker shut down");
                    break;
                }
                _ = self.listener.wait() => {
                    self.run_once().await;
                }
            }
        }
    }

    async fn run_once(&self) {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let started = Instant::now();
        match self.extractor.run().await {
            Ok(rows) => {
                debug!(
                    extractor = self.extractor.name(),
                    rows,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "feature table rewritten"
                );
                self.count("ok", started);
                if let Err(e) = self.bus.publish(self.extractor.publishes()).await {
                    warn!(extractor = self.extractor.name(), "failed to publish knowledge update: {}", e);
                }
            }
            Err(e) => {
                warn!(extractor = self.extractor.name(), "extractor run failed: {}", e);
                self.count("error", started);
            }
        }
    }

    fn count(&self, outcome: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics
                .extractor_runs_total
                .with_label_values(&[self.extractor.name(), outcome])
                .inc();
            metrics
                .extractor_run_duration_seconds
                .with_label_values(&[self.extractor.name()])
                .observe(started.elapsed().as_secs_f64());
        }
    }
}
