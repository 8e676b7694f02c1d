// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Owns the Prometheus registry and every metric the Cortex subsystems
//! emit. One instance is created at daemon startup and shared via `Arc`;
//! the `/metrics` endpoint encodes the registry on demand.
//!
//! ## Metric families
//!
//! - `cortex_pipeline_runs_total{pipeline, outcome}` - scheduling
//!   decisions per pipeline and outcome (`ok`, `error`)
//! - `cortex_pipeline_run_duration_seconds{pipeline}` - end-to-end
//!   decision latency
//! - `cortex_step_runs_total{step, outcome}` - per-step outcomes
//!   (`ok`, `skipped`, `error`)
//! - `cortex_extractor_runs_total{extractor, outcome}` - extractor
//!   rewrites per outcome
//! - `cortex_extractor_run_duration_seconds{extractor}` - rewrite latency
//! - `cortex_descheduler_moves_total{outcome}` - executor outcomes
//! - `cortex_sync_runs_total{source, outcome}` - data source syncs
//! - `cortex_feature_rows{table}` / `cortex_feature_age_seconds{table}` -
//!   KPI gauges over the materialized knowledge

use prometheus::{
    GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use cortex_domain::SchedulerError;

const NAMESPACE: &str = "cortex";

/// Prometheus registry plus every Cortex metric family.
pub struct MetricsService {
    registry: Arc<Registry>,
    pub pipeline_runs_total: IntCounterVec,
    pub pipeline_run_duration_seconds: HistogramVec,
    pub step_runs_total: IntCounterVec,
    pub extractor_runs_total: IntCounterVec,
    pub extractor_run_duration_seconds: HistogramVec,
    pub descheduler_moves_total: IntCounterVec,
    pub sync_runs_total: IntCounterVec,
    pub feature_rows: IntGaugeVec,
    pub feature_age_seconds: GaugeVec,
}

impl MetricsService {
    /// Creates the service with a fresh registry and registers all
    /// metric families.
    pub fn new() -> Result<Self, SchedulerError> {
        let registry = Registry::new();

        let pipeline_runs_total = IntCounterVec::new(
            Opts::new("pipeline_runs_total", "Scheduling pipeline executions").namespace(NAMESPACE),
            &["pipeline", "outcome"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create pipeline_runs_total: {}", e)))?;

        let pipeline_run_duration_seconds = HistogramVec::new(
            HistogramOpts::new("pipeline_run_duration_seconds", "Scheduling decision latency")
                .namespace(NAMESPACE)
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["pipeline"],
        )
        .map_err(|e| {
            SchedulerError::metrics_error(format!("failed to create pipeline_run_duration_seconds: {}", e))
        })?;

        let step_runs_total = IntCounterVec::new(
            Opts::new("step_runs_total", "Per-step run outcomes").namespace(NAMESPACE),
            &["step", "outcome"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create step_runs_total: {}", e)))?;

        let extractor_runs_total = IntCounterVec::new(
            Opts::new("extractor_runs_total", "Feature extractor runs").namespace(NAMESPACE),
            &["extractor", "outcome"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create extractor_runs_total: {}", e)))?;

        let extractor_run_duration_seconds = HistogramVec::new(
            HistogramOpts::new("extractor_run_duration_seconds", "Feature table rewrite latency")
                .namespace(NAMESPACE)
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["extractor"],
        )
        .map_err(|e| {
            SchedulerError::metrics_error(format!("failed to create extractor_run_duration_seconds: {}", e))
        })?;

        let descheduler_moves_total = IntCounterVec::new(
            Opts::new("descheduler_moves_total", "Descheduler executor outcomes").namespace(NAMESPACE),
            &["outcome"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create descheduler_moves_total: {}", e)))?;

        let sync_runs_total = IntCounterVec::new(
            Opts::new("sync_runs_total", "Data source sync outcomes").namespace(NAMESPACE),
            &["source", "outcome"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create sync_runs_total: {}", e)))?;

        let feature_rows = IntGaugeVec::new(
            Opts::new("feature_rows", "Rows in each feature table").namespace(NAMESPACE),
            &["table"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create feature_rows: {}", e)))?;

        let feature_age_seconds = GaugeVec::new(
            Opts::new("feature_age_seconds", "Age of each feature table generation").namespace(NAMESPACE),
            &["table"],
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create feature_age_seconds: {}", e)))?;

        for collector in [
            Box::new(pipeline_runs_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(pipeline_run_duration_seconds.clone()),
            Box::new(step_runs_total.clone()),
            Box::new(extractor_runs_total.clone()),
            Box::new(extractor_run_duration_seconds.clone()),
            Box::new(descheduler_moves_total.clone()),
            Box::new(sync_runs_total.clone()),
            Box::new(feature_rows.clone()),
            Box::new(feature_age_seconds.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| SchedulerError::metrics_error(format!("failed to register metric: {}", e)))?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            pipeline_runs_total,
            pipeline_run_duration_seconds,
            step_runs_total,
            extractor_runs_total,
            extractor_run_duration_seconds,
            descheduler_moves_total,
            sync_runs_total,
            feature_rows,
            feature_age_seconds,
        })
    }

    /// Encodes the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, SchedulerError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|e| SchedulerError::metrics_error(format!("failed to encode metrics: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_encode() {
        let metrics = MetricsService::new().unwrap();
        metrics
            .pipeline_runs_total
            .with_label_values(&["default", "ok"])
            .inc();
        metrics.feature_rows.with_label_values(&["feature_host_capacity"]).set(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("cortex_pipeline_runs_total"));
        assert!(text.contains("cortex_feature_rows"));
    }

    #[test]
    fn test_two_services_do_not_collide() {
        // Each service owns its registry, so parallel tests never fight
        // over the global default registry.
        let a = MetricsService::new().unwrap();
        let b = MetricsService::new().unwrap();
        a.step_runs_total.with_label_values(&["binpacking", "ok"]).inc();
        assert!(!b.encode().unwrap().contains("binpacking"));
    }
}
