// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Telemetry Source
//!
//! Ingests pre-aggregated telemetry samples (one row per host and metric,
//! with window average and maximum) from the metrics back-end's read-only
//! endpoint into the cache.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use cortex_domain::events::topics;
use cortex_domain::services::DataSource;
use cortex_domain::SchedulerError;

#[derive(Debug, Deserialize)]
struct TelemetrySample {
    host: String,
    metric: String,
    avg: f64,
    max: f64,
}

/// Syncs telemetry samples into the cache.
pub struct TelemetrySource {
    pool: SqlitePool,
    client: reqwest::Client,
    base_url: String,
}

impl TelemetrySource {
    pub fn new(pool: SqlitePool, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DataSource for TelemetrySource {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn topic(&self) -> &'static str {
        topics::SYNC_TELEMETRY
    }

    async fn sync(&self) -> Result<u64, SchedulerError> {
        let samples: Vec<TelemetrySample> = self
            .client
            .get(format!("{}/samples", self.base_url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SchedulerError::IoError(format!("telemetry listing failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SchedulerError::SerializationError(format!("malformed telemetry listing: {}", e)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to begin sync transaction: {}", e)))?;

        sqlx::query("DELETE FROM cache_telemetry")
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        for sample in &samples {
            sqlx::query("INSERT OR REPLACE INTO cache_telemetry (host, metric, avg, max) VALUES (?, ?, ?, ?)")
                .bind(&sample.host)
                .bind(&sample.metric)
                .bind(sample.avg)
                .bind(sample.max)
                .execute(&mut *tx)
                .await
                .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to commit sync: {}", e)))?;

        debug!(count = samples.len(), "synced telemetry samples");
        Ok(samples.len() as u64)
    }
}
