// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! The declarative shape of one scheduling pipeline: a name and an
//! ordered list of step configurations. Configuration is immutable after
//! pipeline construction; reconfiguration replaces the whole pipeline
//! atomically.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::SchedulerError;
use crate::value_objects::activation::ActivationFunction;

/// Configuration of one step inside a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Registered step name; must exist in the step registry of the
    /// pipeline's scheduling domain.
    pub name: String,
    /// Raw options blob handed to the step's init.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
    /// Override of the step's activation function, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationFunction>,
}

impl StepConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
            activation: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_activation(mut self, activation: ActivationFunction) -> Self {
        self.activation = Some(activation);
        self
    }
}

/// The ordered configuration of one named scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub steps: Vec<StepConfig>,
    /// Emit per-step traces in results.
    #[serde(default)]
    pub tracing: bool,
}

impl PipelineConfig {
    /// Creates a validated pipeline configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the name is empty or a step name
    /// appears twice (steps are identified by name in traces and
    /// metrics labels, so duplicates would alias).
    pub fn new(name: impl Into<String>, steps: Vec<StepConfig>) -> Result<Self, SchedulerError> {
        let config = Self {
            name: name.into(),
            steps,
            tracing: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates name and step uniqueness.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.name.is_empty() {
            return Err(SchedulerError::invalid_config("pipeline name cannot be empty"));
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(SchedulerError::invalid_config(format!(
                    "pipeline {} contains a step with an empty name",
                    self.name
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(SchedulerError::invalid_config(format!(
                    "pipeline {} configures step {} twice",
                    self.name, step.name
                )));
            }
        }
        Ok(())
    }

    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }
}
