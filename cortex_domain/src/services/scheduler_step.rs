// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Step Contract
//!
//! The plugin seam of the scheduling pipeline. A step is either a
//! *filter* (may only remove candidates, never reweigh them) or a
//! *weigher* (adjusts activations of every candidate, never removes one).
//! Both satisfy the same trait; the contract difference lives in what
//! their [`StepResult`] may contain.
//!
//! ## Lifecycle
//!
//! Every step declares a name (stable in configuration and metrics
//! labels) and an options schema. At pipeline construction the registry
//! produces a fresh instance and the pipeline calls
//! [`SchedulerStep::init`] with the raw options blob and a handle to the
//! feature cache. Init must validate options: unknown keys, out-of-range
//! numeric bounds, and inconsistent pairs (equal min-max bounds that
//! would zero-divide) are descriptive errors that abort construction.
//!
//! ## Run contract
//!
//! - Steps must be safe for concurrent invocation with distinct inputs;
//!   many requests execute in parallel on separate tasks.
//! - A step run must be pure with respect to the feature cache snapshot
//!   it reads; activations are never NaN or infinite; out-of-domain
//!   inputs are clamped before scaling.
//! - A step that deliberately opts out of one request returns the
//!   [`SchedulerError::StepSkipped`] sentinel, which the pipeline
//!   swallows. Any other error is fatal for the request and propagates.

use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::placement_request::PlacementRequest;
use crate::error::SchedulerError;
use crate::repositories::knowledge_store::KnowledgeStore;
use crate::value_objects::activation::{ActivationFunction, StepResult};
use crate::value_objects::step_options::StepOptions;

/// Per-request tracing context carried through every step run.
#[derive(Debug, Clone)]
pub struct StepTrace {
    /// Correlation id of the request being scheduled.
    pub request_id: String,
    /// Name of the pipeline executing the step.
    pub pipeline: String,
    /// Configured name of the step itself.
    pub step: String,
}

impl StepTrace {
    pub fn new(request_id: impl Into<String>, pipeline: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            pipeline: pipeline.into(),
            step: step.into(),
        }
    }
}

/// One step of a scheduling pipeline, generic over the request domain.
#[async_trait]
pub trait SchedulerStep<R: PlacementRequest>: Send + Sync {
    /// Identifier stable in configuration and metrics labels.
    fn name(&self) -> &'static str;

    /// The activation function applied to this step's raw activations
    /// before they are added to the running weights. Defaults to the
    /// saturating hyperbolic tangent; steps expressing hard scores
    /// override with [`ActivationFunction::Identity`].
    fn activation_function(&self) -> ActivationFunction {
        ActivationFunction::Tanh
    }

    /// Validates options and captures the feature cache handle.
    ///
    /// Called exactly once, at pipeline construction. A failing init
    /// aborts construction of the whole pipeline.
    async fn init(&mut self, options: StepOptions, store: Arc<dyn KnowledgeStore>) -> Result<(), SchedulerError>;

    /// Runs the step for one request.
    ///
    /// The returned activation key set must be a subset of the request's
    /// candidates (filters) or exactly the candidate set (weighers).
    async fn run(&self, trace: &StepTrace, request: &R) -> Result<StepResult, SchedulerError>;
}

impl<R: PlacementRequest> std::fmt::Debug for dyn SchedulerStep<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SchedulerStep").field(&self.name()).finish()
    }
}
