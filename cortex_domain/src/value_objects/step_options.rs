// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Options
//!
//! Typed access to the raw options blob a step receives at init.
//!
//! Options arrive from configuration as a JSON object. A step consumes the
//! keys it recognizes through the typed getters, then calls
//! [`StepOptions::finish`], which rejects any key nobody consumed. That
//! turns a typo like `cpuUperBound` into a descriptive init error instead
//! of a silently inert option.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SchedulerError;

/// The raw options blob for one step, with consumed-key tracking.
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    values: BTreeMap<String, Value>,
    consumed: Vec<String>,
}

impl StepOptions {
    /// Builds options from a JSON value; must be an object or null.
    pub fn from_json(raw: Value) -> Result<Self, SchedulerError> {
        let values = match raw {
            Value::Null => BTreeMap::new(),
            Value::Object(map) => map.into_iter().collect(),
            other => {
                return Err(SchedulerError::invalid_config(format!(
                    "step options must be an object, got {}",
                    other
                )))
            }
        };
        Ok(Self {
            values,
            consumed: Vec::new(),
        })
    }

    /// Builds options from an already-typed map.
    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            consumed: Vec::new(),
        }
    }

    fn take(&mut self, key: &str) -> Option<Value> {
        let value = self.values.get(key).cloned();
        if value.is_some() {
            self.consumed.push(key.to_string());
        }
        value
    }

    /// Reads an optional float option.
    pub fn get_f64(&mut self, key: &str) -> Result<Option<f64>, SchedulerError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| SchedulerError::invalid_config(format!("option {} is not a float", key))),
            Some(other) => Err(SchedulerError::invalid_config(format!(
                "option {} must be a number, got {}",
                key, other
            ))),
        }
    }

    /// Reads an optional boolean option.
    pub fn get_bool(&mut self, key: &str) -> Result<Option<bool>, SchedulerError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(SchedulerError::invalid_config(format!(
                "option {} must be a boolean, got {}",
                key, other
            ))),
        }
    }

    /// Reads an optional string option.
    pub fn get_string(&mut self, key: &str) -> Result<Option<String>, SchedulerError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(SchedulerError::invalid_config(format!(
                "option {} must be a string, got {}",
                key, other
            ))),
        }
    }

    /// Reads an optional list-of-strings option (allow-lists).
    pub fn get_string_list(&mut self, key: &str) -> Result<Option<Vec<String>>, SchedulerError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(SchedulerError::invalid_config(format!(
                        "option {} must contain only strings, got {}",
                        key, other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(SchedulerError::invalid_config(format!(
                "option {} must be a list of strings, got {}",
                key, other
            ))),
        }
    }

    /// Rejects any option key no getter consumed.
    ///
    /// Call after all recognized keys have been read.
    pub fn finish(self) -> Result<(), SchedulerError> {
        let unknown: Vec<String> = self
            .values
            .keys()
            .filter(|k| !self.consumed.contains(k))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::invalid_config(format!(
                "unknown option keys: {}",
                unknown.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let mut options = StepOptions::from_json(json!({
            "cpuLowerBound": 0.5,
            "enabled": true,
            "flavors": ["m1.small", "m1.large"],
        }))
        .unwrap();

        assert_eq!(options.get_f64("cpuLowerBound").unwrap(), Some(0.5));
        assert_eq!(options.get_bool("enabled").unwrap(), Some(true));
        assert_eq!(
            options.get_string_list("flavors").unwrap(),
            Some(vec!["m1.small".to_string(), "m1.large".to_string()])
        );
        assert_eq!(options.get_f64("missing").unwrap(), None);
        options.finish().unwrap();
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut options = StepOptions::from_json(json!({"cpuUperBound": 1.0})).unwrap();
        // The step only recognizes cpuUpperBound; the typo survives to finish().
        assert_eq!(options.get_f64("cpuUpperBound").unwrap(), None);
        let err = options.finish().unwrap_err();
        assert!(err.to_string().contains("cpuUperBound"));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut options = StepOptions::from_json(json!({"enabled": "yes"})).unwrap();
        assert!(options.get_bool("enabled").is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(StepOptions::from_json(json!([1, 2, 3])).is_err());
        assert!(StepOptions::from_json(json!(null)).is_ok());
    }
}
