// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compute Workload Mover
//!
//! Issues migration requests against the compute API and reports the
//! observed workload state. Target selection stays with the platform's
//! scheduler (which in turn delegates back to Cortex), so the mover only
//! ever says "move this workload somewhere else".

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use cortex_domain::services::{WorkloadMover, WorkloadState};
use cortex_domain::SchedulerError;

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerStateDto,
}

#[derive(Debug, Deserialize)]
struct ServerStateDto {
    status: String,
    #[serde(rename = "OS-EXT-SRV-ATTR:host")]
    host: Option<String>,
}

/// Mover backed by the compute API.
pub struct NovaWorkloadMover {
    client: reqwest::Client,
    base_url: String,
}

impl NovaWorkloadMover {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WorkloadMover for NovaWorkloadMover {
    async fn issue_move(&self, workload_id: &str) -> Result<(), SchedulerError> {
        self.client
            .post(format!("{}/servers/{}/action", self.base_url, workload_id))
            .json(&json!({ "migrate": null }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SchedulerError::executor_error(format!("migrate {} failed: {}", workload_id, e)))?;
        Ok(())
    }

    async fn state(&self, workload_id: &str) -> Result<WorkloadState, SchedulerError> {
        let envelope: ServerEnvelope = self
            .client
            .get(format!("{}/servers/{}", self.base_url, workload_id))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SchedulerError::executor_error(format!("state of {} unavailable: {}", workload_id, e)))?
            .json()
            .await
            .map_err(|e| SchedulerError::SerializationError(format!("malformed server state: {}", e)))?;

        let state = match envelope.server.status.to_uppercase().as_str() {
            "MIGRATING" | "RESIZE" | "VERIFY_RESIZE" => WorkloadState::Migrating,
            "ACTIVE" | "SHUTOFF" => match envelope.server.host {
                Some(host) => WorkloadState::Stable { host },
                None => WorkloadState::Other(envelope.server.status),
            },
            other => WorkloadState::Other(other.to_string()),
        };
        Ok(state)
    }
}
