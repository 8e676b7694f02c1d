// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduling Pipeline
//!
//! The decision engine proper: an ordered sequence of initialized steps
//! that transforms a placement request into an ordered host list.
//!
//! ## Execution model (one request)
//!
//! 1. Seed the per-host weights from the request's seed weights, or `0.0`
//!    for every candidate when none were supplied.
//! 2. Run each step in configured order. The skip sentinel leaves state
//!    untouched; any other error is fatal for the request. A successful
//!    result shrinks the candidate set to the intersection with the
//!    result's key set, and every surviving host's weight grows by
//!    `activation_function(activation)`.
//! 3. Sort the surviving candidates by weight, descending, ties stable in
//!    input order.
//!
//! An emptied candidate set does not short-circuit: remaining steps still
//! run (as no-ops) so their statistics are emitted uniformly, and the
//! caller receives an empty order to decide on. Filters therefore never
//! fail a request by filtering everything.
//!
//! ## Concurrency
//!
//! One execution is single-threaded and cooperative; many executions run
//! in parallel on separate tasks. Steps hold no per-request state, and
//! the feature cache is only ever read on this path.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use cortex_bootstrap::CancellationToken;
use cortex_domain::repositories::KnowledgeStore;
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{
    ActivationFunction, PipelineConfig, PipelineResult, PlacementRequest, SchedulerError, StepOptions,
    StepTraceRecord,
};

use crate::application::services::step_registry::StepRegistry;
use crate::infrastructure::metrics::MetricsService;

struct ConfiguredStep<R: PlacementRequest + 'static> {
    name: String,
    activation: ActivationFunction,
    step: Box<dyn SchedulerStep<R>>,
}

/// An initialized, immutable pipeline for one scheduling domain.
pub struct SchedulingPipeline<R: PlacementRequest + 'static> {
    name: String,
    tracing_enabled: bool,
    steps: Vec<ConfiguredStep<R>>,
    metrics: Option<Arc<MetricsService>>,
}

impl<R: PlacementRequest + 'static> std::fmt::Debug for SchedulingPipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulingPipeline")
            .field("name", &self.name)
            .field("tracing_enabled", &self.tracing_enabled)
            .field("steps", &self.steps.iter().map(|s| &s.name).collect::<Vec<_>>())
            .finish()
    }
}

impl<R: PlacementRequest + 'static> SchedulingPipeline<R> {
    /// Builds the pipeline: looks every configured step up in the
    /// registry, initializes it with its options and the feature cache
    /// handle, and retains the sequence.
    ///
    /// # Errors
    ///
    /// An unknown step name or a failing init aborts construction with
    /// `InvalidConfiguration` naming the offending step.
    pub async fn build(
        config: &PipelineConfig,
        registry: &StepRegistry<R>,
        store: Arc<dyn KnowledgeStore>,
        metrics: Option<Arc<MetricsService>>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        let mut steps = Vec::with_capacity(config.steps.len());
        for step_config in &config.steps {
            let mut step = registry.create(&step_config.name)?;
            let options = StepOptions::from_map(step_config.options.clone());
            step.init(options, store.clone()).await.map_err(|e| {
                SchedulerError::invalid_config(format!(
                    "step {} of pipeline {} failed to initialize: {}",
                    step_config.name, config.name, e
                ))
            })?;
            let activation = step_config.activation.unwrap_or_else(|| step.activation_function());
            steps.push(ConfiguredStep {
                name: step_config.name.clone(),
                activation,
                step,
            });
        }

        Ok(Self {
            name: config.name.clone(),
            tracing_enabled: config.tracing,
            steps,
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes the pipeline for one request.
    pub async fn run(&self, request: &R) -> Result<PipelineResult, SchedulerError> {
        self.execute(request, None).await
    }

    /// Executes the pipeline, exiting at the next step boundary once the
    /// token is cancelled.
    pub async fn run_cancellable(
        &self,
        request: &R,
        token: &CancellationToken,
    ) -> Result<PipelineResult, SchedulerError> {
        self.execute(request, Some(token)).await
    }

    async fn execute(&self, request: &R, token: Option<&CancellationToken>) -> Result<PipelineResult, SchedulerError> {
        let started = Instant::now();
        let result = self.execute_inner(request, token).await;

        if let Some(metrics) = &self.metrics {
            let outcome = if result.is_ok() { "ok" } else { "error" };
            metrics
                .pipeline_runs_total
                .with_label_values(&[&self.name, outcome])
                .inc();
            metrics
                .pipeline_run_duration_seconds
                .with_label_values(&[&self.name])
                .observe(started.elapsed().as_secs_f64());
        }

        result
    }

    async fn execute_inner(
        &self,
        request: &R,
        token: Option<&CancellationToken>,
    ) -> Result<PipelineResult, SchedulerError> {
        request.validate()?;

        // Seed weights, input order recorded for stable ties.
        let mut candidates: Vec<String> = request.candidates().iter().map(|c| c.host.clone()).collect();
        let seed = request.seed_weights();
        let mut weights: HashMap<String, f64> = candidates
            .iter()
            .map(|host| (host.clone(), seed.get(host).copied().unwrap_or(0.0)))
            .collect();

        let mut traces: Vec<StepTraceRecord> = Vec::new();

        for configured in &self.steps {
            if let Some(token) = token {
                if token.is_cancelled() {
                    return Err(SchedulerError::Cancelled(format!(
                        "pipeline {} cancelled before step {}",
                        self.name, configured.name
                    )));
                }
            }

            let trace = StepTrace::new(request.request_id(), &self.name, &configured.name);
            match configured.step.run(&trace, request).await {
                Err(e) if e.is_skip() => {
                    debug!(
                        request_id = %trace.request_id,
                        pipeline = %self.name,
                        step = %configured.name,
                        "step skipped: {}", e
                    );
                    self.count_step(&configured.name, "skipped");
                    if self.tracing_enabled {
                        traces.push(StepTraceRecord {
                            step: configured.name.clone(),
                            kept: candidates.len(),
                            skipped: true,
                            statistics: HashMap::new(),
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        request_id = %trace.request_id,
                        pipeline = %self.name,
                        step = %configured.name,
                        "step failed: {}", e
                    );
                    self.count_step(&configured.name, "error");
                    return Err(e);
                }
                Ok(result) => {
                    if !result.is_finite() {
                        self.count_step(&configured.name, "error");
                        return Err(SchedulerError::internal_error(format!(
                            "step {} produced a non-finite activation",
                            configured.name
                        )));
                    }

                    candidates.retain(|host| result.activations.contains_key(host));
                    for host in &candidates {
                        let activation = result.activations[host];
                        if let Some(weight) = weights.get_mut(host) {
                            *weight += configured.activation.apply(activation);
                        }
                    }

                    self.count_step(&configured.name, "ok");
                    if self.tracing_enabled {
                        traces.push(StepTraceRecord {
                            step: configured.name.clone(),
                            kept: candidates.len(),
                            skipped: false,
                            statistics: result.statistics,
                        });
                    }
                }
            }
        }

        // Descending by weight; std sort is stable, so ties keep input order.
        let mut ordered = candidates;
        ordered.sort_by(|a, b| weights[b].partial_cmp(&weights[a]).unwrap_or(Ordering::Equal));
        let final_weights: HashMap<String, f64> = ordered.iter().map(|h| (h.clone(), weights[h])).collect();

        debug!(
            request_id = request.request_id(),
            pipeline = %self.name,
            hosts = ordered.len(),
            "pipeline decision complete"
        );

        Ok(PipelineResult {
            ordered_hosts: ordered,
            weights: final_weights,
            step_traces: self.tracing_enabled.then_some(traces),
        })
    }

    fn count_step(&self, step: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.step_runs_total.with_label_values(&[step, outcome]).inc();
        }
    }
}
