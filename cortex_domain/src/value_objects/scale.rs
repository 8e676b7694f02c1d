// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Min-Max Scaling
//!
//! The uniform numeric shaping used by every weigher: an input domain
//! `[lower, upper]` is mapped onto an activation range
//! `[activation_lower, activation_upper]`, clamping out-of-domain inputs
//! to the nearest endpoint first.
//!
//! ```text
//! scale(v, l, u, al, au) = clamp((v - l) / (u - l), 0, 1) * (au - al) + al
//! ```
//!
//! Equal input bounds would zero-divide, so [`MinMaxScale::new`] rejects
//! them at step init; the free [`scale`] function returns `0.0` in that
//! case so run paths never branch on bound equality.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::value_objects::step_options::StepOptions;

/// Min-max scaling over the input domain, clamped before dividing.
///
/// Returns `0.0` when `upper == lower` instead of dividing by zero.
/// Activation bounds may be in either order; `activation_upper <
/// activation_lower` yields a decreasing mapping.
pub fn scale(value: f64, lower: f64, upper: f64, activation_lower: f64, activation_upper: f64) -> f64 {
    if upper == lower {
        return 0.0;
    }
    let fraction = ((value - lower) / (upper - lower)).clamp(0.0, 1.0);
    fraction * (activation_upper - activation_lower) + activation_lower
}

/// A validated min-max scale for one metric.
///
/// Constructed once at step init from the step's options; the run path
/// only ever calls [`MinMaxScale::apply`], which cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScale {
    lower: f64,
    upper: f64,
    activation_lower: f64,
    activation_upper: f64,
}

impl MinMaxScale {
    /// Creates a validated scale.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when any bound is non-finite or the
    /// input bounds are equal (which would zero-divide at run time).
    pub fn new(
        lower: f64,
        upper: f64,
        activation_lower: f64,
        activation_upper: f64,
    ) -> Result<Self, SchedulerError> {
        for (name, value) in [
            ("lower bound", lower),
            ("upper bound", upper),
            ("activation lower bound", activation_lower),
            ("activation upper bound", activation_upper),
        ] {
            if !value.is_finite() {
                return Err(SchedulerError::invalid_config(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        if lower == upper {
            return Err(SchedulerError::invalid_config(format!(
                "lower and upper bounds must differ, both are {}",
                lower
            )));
        }
        Ok(Self {
            lower,
            upper,
            activation_lower,
            activation_upper,
        })
    }

    /// Reads the four `<metric>...Bound` option keys for one metric and
    /// builds a validated scale, falling back to the given defaults for
    /// absent keys.
    ///
    /// Recognized keys for metric `cpu`: `cpuLowerBound`, `cpuUpperBound`,
    /// `cpuActivationLowerBound`, `cpuActivationUpperBound`.
    pub fn from_options(
        options: &mut StepOptions,
        metric: &str,
        defaults: (f64, f64, f64, f64),
    ) -> Result<Self, SchedulerError> {
        let lower = options.get_f64(&format!("{}LowerBound", metric))?.unwrap_or(defaults.0);
        let upper = options.get_f64(&format!("{}UpperBound", metric))?.unwrap_or(defaults.1);
        let activation_lower = options
            .get_f64(&format!("{}ActivationLowerBound", metric))?
            .unwrap_or(defaults.2);
        let activation_upper = options
            .get_f64(&format!("{}ActivationUpperBound", metric))?
            .unwrap_or(defaults.3);
        Self::new(lower, upper, activation_lower, activation_upper).map_err(|e| {
            SchedulerError::invalid_config(format!("invalid bounds for metric {}: {}", metric, e))
        })
    }

    /// Maps a value into the activation range, clamping first.
    pub fn apply(&self, value: f64) -> f64 {
        scale(
            value,
            self.lower,
            self.upper,
            self.activation_lower,
            self.activation_upper,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scale_endpoints() {
        // scale(l) == al, scale(u) == au
        assert_eq!(scale(2.0, 2.0, 10.0, -1.0, 1.0), -1.0);
        assert_eq!(scale(10.0, 2.0, 10.0, -1.0, 1.0), 1.0);
    }

    #[test]
    fn test_scale_clamps_out_of_domain() {
        // scale(x < l) == al, scale(x > u) == au
        assert_eq!(scale(-5.0, 0.0, 10.0, 0.0, 1.0), 0.0);
        assert_eq!(scale(50.0, 0.0, 10.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_scale_equal_bounds_returns_zero() {
        assert_eq!(scale(5.0, 3.0, 3.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_scale_midpoint() {
        assert_eq!(scale(5.0, 0.0, 10.0, 0.0, 1.0), 0.5);
        // Negative activation range (anti-affinity shaping)
        assert_eq!(scale(60.0, 20.0, 100.0, 0.0, -0.5), -0.25);
    }

    #[test]
    fn test_new_rejects_equal_bounds() {
        assert!(MinMaxScale::new(1.0, 1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_new_rejects_non_finite_bounds() {
        assert!(MinMaxScale::new(f64::NAN, 1.0, 0.0, 1.0).is_err());
        assert!(MinMaxScale::new(0.0, f64::INFINITY, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_from_options_uses_defaults_for_absent_keys() {
        let mut options = StepOptions::from_json(serde_json::json!({})).unwrap();
        let scale = MinMaxScale::from_options(&mut options, "cpu", (0.0, 100.0, 0.0, 1.0)).unwrap();
        assert_eq!(scale.apply(50.0), 0.5);
    }

    proptest! {
        /// Output stays inside the activation range for arbitrary inputs.
        #[test]
        fn prop_scale_output_in_range(v in -1e9f64..1e9f64) {
            let out = scale(v, 10.0, 90.0, -0.5, 0.5);
            prop_assert!((-0.5..=0.5).contains(&out));
        }

        /// Scaling is monotonic non-decreasing when au >= al.
        #[test]
        fn prop_scale_monotonic(a in -1e6f64..1e6f64, b in -1e6f64..1e6f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let left = scale(lo, 0.0, 100.0, 0.0, 1.0);
            let right = scale(hi, 0.0, 100.0, 0.0, 1.0);
            prop_assert!(left <= right);
        }
    }
}
