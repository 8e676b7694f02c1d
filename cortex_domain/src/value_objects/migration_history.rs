// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Migration History
//!
//! Per-workload record of where the descheduler (or anyone else) has moved
//! a workload. The cycle detector inspects the ordered visit list within
//! its window: a workload whose history revisits any host is thrashing and
//! must not be proposed again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One recorded move of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHop {
    pub source_host: String,
    pub dest_host: String,
    pub recorded_at: DateTime<Utc>,
}

/// Ordered migration history of one workload within the inspection window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHistory {
    pub workload_id: String,
    /// Hops ordered oldest first.
    pub hops: Vec<MigrationHop>,
}

impl MigrationHistory {
    pub fn new(workload_id: impl Into<String>, hops: Vec<MigrationHop>) -> Self {
        Self {
            workload_id: workload_id.into(),
            hops,
        }
    }

    /// The ordered list of hosts this workload has been observed on.
    ///
    /// Consecutive hops usually chain (`a->b`, `b->c` visits `a, b, c`),
    /// but a gap in the record (`a->b`, `c->d`) contributes both endpoints
    /// of the disconnected hop.
    pub fn visited_hosts(&self) -> Vec<&str> {
        let mut visits: Vec<&str> = Vec::with_capacity(self.hops.len() + 1);
        for hop in &self.hops {
            if visits.last() != Some(&hop.source_host.as_str()) {
                visits.push(&hop.source_host);
            }
            visits.push(&hop.dest_host);
        }
        visits
    }

    /// True if any host appears more than once in the visit list.
    ///
    /// `h1 -> h2 -> h1` is a cycle; `h1 -> h2 -> h3` is not.
    pub fn has_cycle(&self) -> bool {
        let mut seen = HashSet::new();
        self.visited_hosts().into_iter().any(|host| !seen.insert(host))
    }
}
