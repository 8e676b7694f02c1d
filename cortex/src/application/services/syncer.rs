// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data-Source Syncer
//!
//! Periodically runs every configured data source and publishes the
//! source's trigger topic after each completed sync, which wakes the
//! subscribed extractors. A failing source is logged and retried next
//! round; it never blocks the others.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use cortex_bootstrap::CancellationToken;
use cortex_domain::services::DataSource;

use crate::infrastructure::messaging::TriggerBus;
use crate::infrastructure::metrics::MetricsService;

/// The periodic ingestion loop over all data sources.
pub struct Syncer {
    sources: Vec<Arc<dyn DataSource>>,
    bus: Arc<dyn TriggerBus>,
    interval: Duration,
    metrics: Option<Arc<MetricsService>>,
}

impl Syncer {
    pub fn new(
        sources: Vec<Arc<dyn DataSource>>,
        bus: Arc<dyn TriggerBus>,
        interval: Duration,
        metrics: Option<Arc<MetricsService>>,
    ) -> Self {
        Self {
            sources,
            bus,
            interval,
            metrics,
        }
    }

    /// Runs one sync round over every source.
    pub async fn run_once(&self) {
        for source in &self.sources {
            match source.sync().await {
                Ok(rows) => {
                    info!(source = source.name(), rows, "source synced");
                    self.count(source.name(), "ok");
                    if let Err(e) = self.bus.publish(source.topic()).await {
                        warn!(source = source.name(), "failed to publish sync trigger: {}", e);
                    }
                }
                Err(e) => {
                    warn!(source = source.name(), "sync failed: {}", e);
                    self.count(source.name(), "error");
                }
            }
        }
    }

    /// Runs sync rounds on the configured interval until cancelled.
    pub async fn run(&self, token: CancellationToken) {
        loop {
            self.run_once().await;
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    fn count(&self, source: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.sync_runs_total.with_label_values(&[source, outcome]).inc();
        }
    }
}
