// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Activations and Step Results
//!
//! The currency of the scheduling pipeline: every step produces one
//! activation per host it wishes to keep, and the pipeline folds those
//! activations into a running weight per candidate.
//!
//! ## Conventions
//!
//! - `0.0` means "no effect": the host is kept, its weight is unchanged.
//! - Positive values increase preference, negative values decrease it.
//! - A host *absent* from a step's activations is filtered out.
//! - Activations are additive across weigher steps *after* being passed
//!   through the step's [`ActivationFunction`].
//!
//! ## Activation Functions
//!
//! The default function is the hyperbolic tangent: it saturates extreme
//! step outputs into `(-1, 1)` so no single weigher can dominate the
//! composed order. A step that intends a hard score (e.g. a forced-host
//! boost) opts into [`ActivationFunction::Identity`] to bypass saturation.
//! Both functions are deterministic and monotonic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Function applied to a step's raw activations before they are added to
/// the running per-host weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationFunction {
    /// Hyperbolic tangent; saturates into `(-1, 1)`.
    #[default]
    Tanh,
    /// Pass-through for steps that express hard scores.
    Identity,
}

impl ActivationFunction {
    /// Applies the function to a raw activation value.
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            ActivationFunction::Tanh => value.tanh(),
            ActivationFunction::Identity => value,
        }
    }
}

/// Named diagnostic series a step may emit alongside its activations.
///
/// Statistics never influence the decision; they are surfaced in traces
/// and metrics so operators can see *why* a step weighed hosts the way it
/// did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatistics {
    /// Unit of the series, e.g. `"MB"` or `"percent"`.
    pub unit: String,
    /// Value per host.
    pub hosts: HashMap<String, f64>,
}

impl StepStatistics {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            hosts: HashMap::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>, value: f64) -> Self {
        self.hosts.insert(host.into(), value);
        self
    }
}

/// The outcome of one step run.
///
/// The key set of `activations` is the exact set of hosts the step wishes
/// to keep. Filters shrink it; weighers must reproduce every input
/// candidate (a weigher never filters).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Activation per kept host; see module conventions.
    pub activations: HashMap<String, f64>,
    /// Optional diagnostic series keyed by statistic name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub statistics: HashMap<String, StepStatistics>,
}

impl StepResult {
    /// Result keeping the given hosts with zero activation (no effect).
    pub fn keep_unchanged<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            activations: hosts.into_iter().map(|h| (h.into(), 0.0)).collect(),
            statistics: HashMap::new(),
        }
    }

    /// Result with explicit activations.
    pub fn from_activations(activations: HashMap<String, f64>) -> Self {
        Self {
            activations,
            statistics: HashMap::new(),
        }
    }

    /// Attaches a named statistic series.
    pub fn with_statistics(mut self, name: impl Into<String>, stats: StepStatistics) -> Self {
        self.statistics.insert(name.into(), stats);
        self
    }

    /// True if every activation is finite (no NaN, no ±Inf).
    ///
    /// Weighers must never emit non-finite values; the pipeline enforces
    /// this invariant before folding activations into weights.
    pub fn is_finite(&self) -> bool {
        self.activations.values().all(|v| v.is_finite())
    }
}

/// Per-step record attached to a [`PipelineResult`] when tracing is on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTraceRecord {
    /// Configured step name.
    pub step: String,
    /// Number of candidates remaining after this step.
    pub kept: usize,
    /// Whether the step skipped itself for this request.
    pub skipped: bool,
    /// Diagnostic series the step emitted.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub statistics: HashMap<String, StepStatistics>,
}

/// The ordered decision produced by one pipeline execution.
///
/// Invariants:
/// - every host in `ordered_hosts` appears in the request's candidate set;
/// - the order is descending by final weight, stable for ties (input order
///   preserved);
/// - a host filtered by any step is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Hosts in scheduling order, best first.
    pub ordered_hosts: Vec<String>,
    /// Final composed weight per ordered host.
    pub weights: HashMap<String, f64>,
    /// Per-step traces, present when tracing was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_traces: Option<Vec<StepTraceRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tanh_saturates_and_identity_passes_through() {
        assert!(ActivationFunction::Tanh.apply(100.0) < 1.0);
        assert!(ActivationFunction::Tanh.apply(-100.0) > -1.0);
        assert_eq!(ActivationFunction::Identity.apply(100.0), 100.0);
    }

    #[test]
    fn test_activation_functions_are_monotonic() {
        let samples = [-5.0, -1.0, -0.5, 0.0, 0.5, 1.0, 5.0];
        for f in [ActivationFunction::Tanh, ActivationFunction::Identity] {
            for pair in samples.windows(2) {
                assert!(f.apply(pair[0]) < f.apply(pair[1]), "{:?} not monotonic", f);
            }
        }
    }

    #[test]
    fn test_zero_maps_to_zero() {
        assert_eq!(ActivationFunction::Tanh.apply(0.0), 0.0);
        assert_eq!(ActivationFunction::Identity.apply(0.0), 0.0);
    }

    #[test]
    fn test_keep_unchanged_marks_all_hosts_no_effect() {
        let result = StepResult::keep_unchanged(["h1", "h2"]);
        assert_eq!(result.activations.len(), 2);
        assert_eq!(result.activations["h1"], 0.0);
        assert_eq!(result.activations["h2"], 0.0);
        assert!(result.is_finite());
    }

    #[test]
    fn test_is_finite_rejects_nan() {
        let mut activations = HashMap::new();
        activations.insert("h1".to_string(), f64::NAN);
        assert!(!StepResult::from_activations(activations).is_finite());
    }
}
