// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Placement Request Capability
//!
//! The pipeline is polymorphic over the scheduling domains (compute,
//! share, block, machine, pod) through the [`PlacementRequest`] capability
//! trait rather than inheritance: each domain's request value exposes its
//! candidates and seed weights, and steps that need domain specifics work
//! against the concrete request type they are registered for.
//!
//! ## Ownership
//!
//! The pipeline *borrows* a request for the duration of one call; the
//! ordered host list it returns is owned by the caller. Requests never
//! interact across pipeline executions.
//!
//! ## The weights contract
//!
//! Callers must supply seed weights covering exactly the candidate set
//! (or none at all, in which case every candidate seeds at `0.0`).
//! [`PlacementRequest::validate`] enforces this before any step runs; a
//! violation rejects the request without producing a decision.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SchedulerError;

/// One candidate host as supplied by the calling scheduler.
///
/// The host identifier is opaque to the pipeline: a compute host, a
/// storage pool, a machine pool, or a node name. It is the key in every
/// per-candidate map and is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCandidate {
    /// Opaque host identifier; the key in all per-candidate maps.
    pub host: String,
    /// Secondary identifier when the caller distinguishes the service
    /// host from the backing hypervisor or pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_host: Option<String>,
    /// Caller-reported host status (`enabled`, `drained`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl HostCandidate {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service_host: None,
            status: None,
        }
    }
}

/// Caller-supplied host instructions honored by the host-instruction
/// filter: an explicit force list and/or an ignore list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInstructions {
    /// When non-nil, only these hosts are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_hosts: Option<Vec<String>>,
    /// When non-nil, these hosts are removed after the force filter
    /// (ignore wins over force when they intersect).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_hosts: Option<Vec<String>>,
}

impl HostInstructions {
    pub fn is_empty(&self) -> bool {
        self.force_hosts.is_none() && self.ignore_hosts.is_none()
    }
}

/// Capability set every schedulable request satisfies.
///
/// The scheduling pipeline only ever touches requests through this trait;
/// domain-specific steps downcast by being generic over the concrete
/// request type instead.
pub trait PlacementRequest: Send + Sync {
    /// Correlation id carried into traces and logs.
    fn request_id(&self) -> &str;

    /// The candidate hosts, in caller order. Order matters: ties in the
    /// final weight preserve it.
    fn candidates(&self) -> &[HostCandidate];

    /// Caller-supplied seed weights. An empty map seeds every candidate
    /// at `0.0`.
    fn seed_weights(&self) -> &HashMap<String, f64>;

    /// Optional pipeline name override for this request.
    fn pipeline_override(&self) -> Option<&str> {
        None
    }

    /// Tenant on whose behalf the workload is placed, when the domain
    /// has one. Steps keyed by project skip themselves when absent.
    fn project_id(&self) -> Option<&str> {
        None
    }

    /// Caller-supplied force/ignore host lists, when the domain carries
    /// them.
    fn host_instructions(&self) -> HostInstructions {
        HostInstructions::default()
    }

    /// Enforces the weights-cover-hosts contract.
    ///
    /// # Errors
    ///
    /// `ValidationError` when a weight references an unknown host or a
    /// candidate is missing from a non-empty weight map, or when the
    /// candidate list contains duplicates.
    fn validate(&self) -> Result<(), SchedulerError> {
        let candidates = self.candidates();
        let mut hosts = std::collections::HashSet::with_capacity(candidates.len());
        for candidate in candidates {
            if !hosts.insert(candidate.host.as_str()) {
                return Err(SchedulerError::validation(format!(
                    "duplicate candidate host {}",
                    candidate.host
                )));
            }
        }
        let weights = self.seed_weights();
        if weights.is_empty() {
            return Ok(());
        }
        for host in weights.keys() {
            if !hosts.contains(host.as_str()) {
                return Err(SchedulerError::validation(format!(
                    "weight assigned to unknown host {}",
                    host
                )));
            }
        }
        for host in &hosts {
            if !weights.contains_key(*host) {
                return Err(SchedulerError::validation(format!(
                    "no weight assigned to host {}",
                    host
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareRequest {
        candidates: Vec<HostCandidate>,
        weights: HashMap<String, f64>,
    }

    impl PlacementRequest for BareRequest {
        fn request_id(&self) -> &str {
            "req-1"
        }
        fn candidates(&self) -> &[HostCandidate] {
            &self.candidates
        }
        fn seed_weights(&self) -> &HashMap<String, f64> {
            &self.weights
        }
    }

    fn request(hosts: &[&str], weights: &[(&str, f64)]) -> BareRequest {
        BareRequest {
            candidates: hosts.iter().map(|h| HostCandidate::new(*h)).collect(),
            weights: weights.iter().map(|(h, w)| (h.to_string(), *w)).collect(),
        }
    }

    #[test]
    fn test_empty_weights_are_valid() {
        assert!(request(&["h1", "h2"], &[]).validate().is_ok());
    }

    #[test]
    fn test_exact_cover_is_valid() {
        assert!(request(&["h1", "h2"], &[("h1", 0.5), ("h2", 1.0)]).validate().is_ok());
    }

    #[test]
    fn test_weight_for_unknown_host_rejected() {
        let err = request(&["h1"], &[("unknown", 1.0)]).validate().unwrap_err();
        assert!(err.to_string().contains("weight assigned to unknown host"));
    }

    #[test]
    fn test_partial_weights_rejected() {
        // The stricter contract applies to every intent, including
        // live-migrate: a partially filled map is rejected outright.
        let err = request(&["h1", "h2"], &[("h1", 1.0)]).validate().unwrap_err();
        assert!(err.to_string().contains("no weight assigned to host h2"));
    }

    #[test]
    fn test_duplicate_candidates_rejected() {
        assert!(request(&["h1", "h1"], &[]).validate().is_err());
    }
}
