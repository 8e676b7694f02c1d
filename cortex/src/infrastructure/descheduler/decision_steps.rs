// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduler Decision Steps
//!
//! Concrete proposers of workloads to move. Each step reads the feature
//! cache (and the server inventory for workload-to-host mapping) and
//! returns workload IDs; the descheduler pipeline unions the proposals.

use async_trait::async_trait;
use sqlx::Row;
use std::collections::BTreeSet;
use std::sync::Arc;

use cortex_domain::repositories::KnowledgeStoreExt;
use cortex_domain::services::DecisionStep;
use cortex_domain::{SchedulerError, StepOptions};

use crate::infrastructure::extractors::{HostContentionFeature, HostUtilizationFeature};
use crate::infrastructure::repositories::SqliteFeatureStore;

async fn workloads_on_hosts(
    store: &SqliteFeatureStore,
    hosts: &BTreeSet<String>,
) -> Result<BTreeSet<String>, SchedulerError> {
    let mut workloads = BTreeSet::new();
    for host in hosts {
        let rows = sqlx::query("SELECT id FROM cache_servers WHERE host = ? AND status = 'ACTIVE'")
            .bind(host)
            .fetch_all(store.pool())
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to list workloads on {}: {}", host, e)))?;
        workloads.extend(rows.into_iter().map(|row| row.get::<String, _>("id")));
    }
    Ok(workloads)
}

/// Proposes every active workload on hosts whose average CPU utilization
/// exceeds a threshold.
pub struct DrainOverloadedHostsStep {
    store: Arc<SqliteFeatureStore>,
    avg_cpu_threshold: f64,
}

impl DrainOverloadedHostsStep {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self {
            store,
            avg_cpu_threshold: 90.0,
        }
    }
}

#[async_trait]
impl DecisionStep for DrainOverloadedHostsStep {
    fn name(&self) -> &'static str {
        "drain_overloaded_hosts"
    }

    async fn init(&mut self, mut options: StepOptions) -> Result<(), SchedulerError> {
        if let Some(threshold) = options.get_f64("avgCpuThreshold")? {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(SchedulerError::invalid_config(format!(
                    "avgCpuThreshold must be within [0, 100], got {}",
                    threshold
                )));
            }
            self.avg_cpu_threshold = threshold;
        }
        options.finish()
    }

    async fn run(&self) -> Result<BTreeSet<String>, SchedulerError> {
        let utilization: Vec<HostUtilizationFeature> = self.store.fetch().await?;
        let overloaded: BTreeSet<String> = utilization
            .into_iter()
            .filter(|u| u.avg_cpu_percent > self.avg_cpu_threshold)
            .map(|u| u.host)
            .collect();
        workloads_on_hosts(&self.store, &overloaded).await
    }
}

/// Proposes every active workload on hosts with sustained CPU steal.
pub struct DrainContendedHostsStep {
    store: Arc<SqliteFeatureStore>,
    long_term_threshold: f64,
}

impl DrainContendedHostsStep {
    pub fn new(store: Arc<SqliteFeatureStore>) -> Self {
        Self {
            store,
            long_term_threshold: 20.0,
        }
    }
}

#[async_trait]
impl DecisionStep for DrainContendedHostsStep {
    fn name(&self) -> &'static str {
        "drain_contended_hosts"
    }

    async fn init(&mut self, mut options: StepOptions) -> Result<(), SchedulerError> {
        if let Some(threshold) = options.get_f64("longTermStealThreshold")? {
            self.long_term_threshold = threshold;
        }
        options.finish()
    }

    async fn run(&self) -> Result<BTreeSet<String>, SchedulerError> {
        let contention: Vec<HostContentionFeature> = self.store.fetch().await?;
        let contended: BTreeSet<String> = contention
            .into_iter()
            .filter(|c| c.long_term_steal > self.long_term_threshold)
            .map(|c| c.host)
            .collect();
        workloads_on_hosts(&self.store, &contended).await
    }
}
