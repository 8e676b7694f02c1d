// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Trigger Topics
//!
//! Well-known topic strings announcing "data source X synced" or
//! "feature Y updated". Publishers fire-and-forget; delivery is
//! at-least-once; subscribers tolerate duplicates by coalescing.
//!
//! Topics form a DAG: extractors subscribe to upstream topics and publish
//! a downstream topic when their write completes. [`TopicGraph`]
//! validates the declared topology for cycles at startup, because a cycle
//! would keep the extractor pool busy forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::SchedulerError;

/// Topic constants for the built-in data sources and features.
pub mod topics {
    /// Hypervisor inventory synced into the cache.
    pub const SYNC_HYPERVISORS: &str = "cortex/sync/hypervisors";
    /// Server (VM) inventory synced into the cache.
    pub const SYNC_SERVERS: &str = "cortex/sync/servers";
    /// Telemetry samples synced into the cache.
    pub const SYNC_TELEMETRY: &str = "cortex/sync/telemetry";

    /// Feature table updated; suffixed by the extractor name.
    pub const FEATURE_PREFIX: &str = "cortex/features/";

    /// The knowledge-updated topic of one extractor.
    pub fn feature_updated(extractor: &str) -> String {
        format!("{}{}", FEATURE_PREFIX, extractor)
    }
}

/// One trigger occurrence delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub topic: String,
    pub occurred_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn now(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Declared subscribe/publish topology of the extractor pool.
///
/// Nodes are topics; an edge runs from each subscribed topic to the
/// published topic of the same extractor.
#[derive(Debug, Default)]
pub struct TopicGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
    nodes: BTreeSet<String>,
}

impl TopicGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares one extractor's subscribes -> publishes edges.
    pub fn declare(&mut self, subscribes: &[&str], publishes: &str) {
        self.nodes.insert(publishes.to_string());
        for topic in subscribes {
            self.nodes.insert((*topic).to_string());
            self.edges
                .entry((*topic).to_string())
                .or_default()
                .insert(publishes.to_string());
        }
    }

    /// Validates the topology is acyclic (Kahn's algorithm).
    ///
    /// # Errors
    ///
    /// `Fatal` naming the topics stuck in a cycle; startup must abort.
    pub fn validate_acyclic(&self) -> Result<(), SchedulerError> {
        let mut indegree: BTreeMap<&str, usize> = self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for targets in self.edges.values() {
            for target in targets {
                *indegree.entry(target.as_str()).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            if let Some(targets) = self.edges.get(node) {
                for target in targets {
                    let d = indegree.get_mut(target.as_str()).expect("target is a node");
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(target.as_str());
                    }
                }
            }
        }

        if visited == self.nodes.len() {
            Ok(())
        } else {
            let stuck: Vec<&str> = indegree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(n, _)| *n)
                .collect();
            Err(SchedulerError::fatal(format!(
                "trigger topology contains a cycle through: {}",
                stuck.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_topology_is_acyclic() {
        let mut graph = TopicGraph::new();
        graph.declare(&[topics::SYNC_HYPERVISORS], "cortex/features/host_capacity");
        graph.declare(
            &["cortex/features/host_capacity", topics::SYNC_TELEMETRY],
            "cortex/features/host_utilization",
        );
        assert!(graph.validate_acyclic().is_ok());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = TopicGraph::new();
        graph.declare(&["a"], "b");
        graph.declare(&["b"], "c");
        graph.declare(&["c"], "a");
        let err = graph.validate_acyclic().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let mut graph = TopicGraph::new();
        graph.declare(&["root"], "left");
        graph.declare(&["root"], "right");
        graph.declare(&["left", "right"], "sink");
        assert!(graph.validate_acyclic().is_ok());
    }

    #[test]
    fn test_feature_topic_naming() {
        assert_eq!(topics::feature_updated("host_capacity"), "cortex/features/host_capacity");
    }
}
