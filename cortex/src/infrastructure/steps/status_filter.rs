// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Status Filter
//!
//! Removes candidates whose caller-reported status is not enabled. For
//! migration intents (live migration, evacuation) the subsystem already
//! narrowed the candidate set and forbids further filtering, so the step
//! skips itself as a no-op.

use async_trait::async_trait;
use std::sync::Arc;

use cortex_domain::repositories::KnowledgeStore;
use cortex_domain::services::{SchedulerStep, StepTrace};
use cortex_domain::{ComputeRequest, SchedulerError, StepOptions, StepResult};

/// Intent-aware host status filter for compute requests.
#[derive(Default)]
pub struct StatusFilter;

impl StatusFilter {
    pub fn new() -> Self {
        Self
    }
}

fn is_schedulable(status: Option<&str>) -> bool {
    match status {
        None => true,
        Some(status) => matches!(status.to_lowercase().as_str(), "enabled" | "up"),
    }
}

#[async_trait]
impl SchedulerStep<ComputeRequest> for StatusFilter {
    fn name(&self) -> &'static str {
        "status_filter"
    }

    async fn init(&mut self, options: StepOptions, _store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError> {
        options.finish()
    }

    async fn run(&self, _trace: &StepTrace, request: &ComputeRequest) -> Result<StepResult, SchedulerError> {
        let intent = request.intent()?;
        if intent.is_migration() {
            return Err(SchedulerError::step_skipped(format!(
                "no status filtering on {} requests",
                intent
            )));
        }

        let kept = request
            .candidates
            .iter()
            .filter(|c| is_schedulable(c.status.as_deref()))
            .map(|c| c.host.as_str());

        Ok(StepResult::keep_unchanged(kept))
    }
}
