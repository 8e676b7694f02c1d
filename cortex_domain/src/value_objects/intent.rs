// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Request Intent and Flavor Dispatch
//!
//! Spec-derived enums the pipeline recognizes for intent and flavor
//! dispatch. All three are parsed from caller-supplied, loosely-typed
//! request data, so each parser is explicit about what it tolerates:
//!
//! - [`VmIntent`] comes from `scheduler_hints["_nova_check_type"]`, which
//!   Nova sends either as a scalar string or a single-element list. An
//!   *unknown string* maps to `Create` (new hint values must not break
//!   scheduling); a *non-string* value is a configuration error.
//! - [`HypervisorType`] comes from the flavor extra spec
//!   `capabilities:hypervisor_type`, case-insensitively. Missing or empty
//!   is an error: steps that dispatch on hypervisor type cannot guess.
//! - [`FlavorClass`] comes from `trait:CUSTOM_HANA_EXCLUSIVE_HOST`
//!   (`required` => HANA, `forbidden` => general purpose).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchedulerError;

/// Hint key Nova uses to communicate the scheduling intent.
pub const CHECK_TYPE_HINT: &str = "_nova_check_type";

/// Flavor extra spec naming the required hypervisor.
pub const HYPERVISOR_TYPE_SPEC: &str = "capabilities:hypervisor_type";

/// Flavor extra spec marking HANA exclusive host placement.
pub const HANA_TRAIT_SPEC: &str = "trait:CUSTOM_HANA_EXCLUSIVE_HOST";

/// What the caller is actually doing with the VM being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmIntent {
    #[default]
    Create,
    Rebuild,
    Resize,
    LiveMigrate,
    Evacuate,
}

impl VmIntent {
    /// Parses the intent from scheduler hints.
    ///
    /// The `_nova_check_type` hint arrives as a scalar string or a
    /// list-of-1. A missing hint or an unknown string value both mean
    /// `Create`; any other shape is a configuration error.
    pub fn from_scheduler_hints(hints: &HashMap<String, Value>) -> Result<Self, SchedulerError> {
        let raw = match hints.get(CHECK_TYPE_HINT) {
            None => return Ok(VmIntent::Create),
            Some(value) => value,
        };
        let text = match raw {
            Value::String(s) => s.as_str(),
            Value::Array(items) => match items.as_slice() {
                [Value::String(s)] => s.as_str(),
                _ => {
                    return Err(SchedulerError::invalid_config(format!(
                        "scheduler hint {} must be a string or a single-element string list, got {}",
                        CHECK_TYPE_HINT, raw
                    )))
                }
            },
            other => {
                return Err(SchedulerError::invalid_config(format!(
                    "scheduler hint {} must be a string, got {}",
                    CHECK_TYPE_HINT, other
                )))
            }
        };
        Ok(match text {
            "rebuild" => VmIntent::Rebuild,
            "resize" => VmIntent::Resize,
            "live_migrate" => VmIntent::LiveMigrate,
            "evacuate" => VmIntent::Evacuate,
            // Unknown check types are treated as plain creations.
            _ => VmIntent::Create,
        })
    }

    /// True for intents that relocate an existing VM.
    pub fn is_migration(&self) -> bool {
        matches!(self, VmIntent::LiveMigrate | VmIntent::Evacuate)
    }
}

impl fmt::Display for VmIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VmIntent::Create => "create",
            VmIntent::Rebuild => "rebuild",
            VmIntent::Resize => "resize",
            VmIntent::LiveMigrate => "live_migrate",
            VmIntent::Evacuate => "evacuate",
        };
        write!(f, "{}", name)
    }
}

/// Hypervisor backing a flavor, from its extra specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypervisorType {
    Qemu,
    Ch,
    VMware,
}

impl HypervisorType {
    /// Parses the hypervisor type from flavor extra specs,
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Missing, empty, or unrecognized values are configuration errors;
    /// dispatch steps must not guess a hypervisor.
    pub fn from_extra_specs(extra_specs: &HashMap<String, String>) -> Result<Self, SchedulerError> {
        let raw = extra_specs
            .get(HYPERVISOR_TYPE_SPEC)
            .map(|s| s.trim())
            .unwrap_or("");
        if raw.is_empty() {
            return Err(SchedulerError::invalid_config(format!(
                "flavor extra spec {} is missing or empty",
                HYPERVISOR_TYPE_SPEC
            )));
        }
        match raw.to_lowercase().as_str() {
            "qemu" => Ok(HypervisorType::Qemu),
            "ch" => Ok(HypervisorType::Ch),
            "vmware vcenter server" => Ok(HypervisorType::VMware),
            other => Err(SchedulerError::invalid_config(format!(
                "unrecognized hypervisor type {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for HypervisorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HypervisorType::Qemu => "qemu",
            HypervisorType::Ch => "ch",
            HypervisorType::VMware => "vmware",
        };
        write!(f, "{}", name)
    }
}

/// Workload class derived from the HANA exclusive host trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlavorClass {
    #[default]
    GeneralPurpose,
    Hana,
}

impl FlavorClass {
    /// Parses the flavor class from flavor extra specs, case-insensitively.
    ///
    /// A missing trait means general purpose; `required`/`forbidden` map
    /// explicitly; anything else is a configuration error.
    pub fn from_extra_specs(extra_specs: &HashMap<String, String>) -> Result<Self, SchedulerError> {
        match extra_specs.get(HANA_TRAIT_SPEC) {
            None => Ok(FlavorClass::GeneralPurpose),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "required" => Ok(FlavorClass::Hana),
                "forbidden" => Ok(FlavorClass::GeneralPurpose),
                other => Err(SchedulerError::invalid_config(format!(
                    "unrecognized value {:?} for flavor trait {}",
                    other, HANA_TRAIT_SPEC
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hints(value: Value) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert(CHECK_TYPE_HINT.to_string(), value);
        map
    }

    #[test]
    fn test_intent_from_scalar_hint() {
        assert_eq!(
            VmIntent::from_scheduler_hints(&hints(json!("resize"))).unwrap(),
            VmIntent::Resize
        );
    }

    #[test]
    fn test_intent_from_single_element_list() {
        assert_eq!(
            VmIntent::from_scheduler_hints(&hints(json!(["live_migrate"]))).unwrap(),
            VmIntent::LiveMigrate
        );
    }

    #[test]
    fn test_intent_missing_hint_is_create() {
        assert_eq!(
            VmIntent::from_scheduler_hints(&HashMap::new()).unwrap(),
            VmIntent::Create
        );
    }

    #[test]
    fn test_intent_unknown_string_is_create() {
        assert_eq!(
            VmIntent::from_scheduler_hints(&hints(json!("cold_migrate"))).unwrap(),
            VmIntent::Create
        );
    }

    #[test]
    fn test_intent_non_string_is_config_error() {
        assert!(VmIntent::from_scheduler_hints(&hints(json!(123))).is_err());
        assert!(VmIntent::from_scheduler_hints(&hints(json!(["a", "b"]))).is_err());
        assert!(VmIntent::from_scheduler_hints(&hints(json!([42]))).is_err());
    }

    fn specs(key: &str, value: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(key.to_string(), value.to_string());
        map
    }

    #[test]
    fn test_hypervisor_type_case_insensitive() {
        assert_eq!(
            HypervisorType::from_extra_specs(&specs(HYPERVISOR_TYPE_SPEC, "Qemu")).unwrap(),
            HypervisorType::Qemu
        );
        assert_eq!(
            HypervisorType::from_extra_specs(&specs(HYPERVISOR_TYPE_SPEC, "VMware vCenter Server")).unwrap(),
            HypervisorType::VMware
        );
        assert_eq!(
            HypervisorType::from_extra_specs(&specs(HYPERVISOR_TYPE_SPEC, "CH")).unwrap(),
            HypervisorType::Ch
        );
    }

    #[test]
    fn test_hypervisor_type_missing_or_empty_is_error() {
        assert!(HypervisorType::from_extra_specs(&HashMap::new()).is_err());
        assert!(HypervisorType::from_extra_specs(&specs(HYPERVISOR_TYPE_SPEC, "  ")).is_err());
    }

    #[test]
    fn test_flavor_class_mapping() {
        assert_eq!(
            FlavorClass::from_extra_specs(&specs(HANA_TRAIT_SPEC, "required")).unwrap(),
            FlavorClass::Hana
        );
        assert_eq!(
            FlavorClass::from_extra_specs(&specs(HANA_TRAIT_SPEC, "Forbidden")).unwrap(),
            FlavorClass::GeneralPurpose
        );
        assert_eq!(
            FlavorClass::from_extra_specs(&HashMap::new()).unwrap(),
            FlavorClass::GeneralPurpose
        );
        assert!(FlavorClass::from_extra_specs(&specs(HANA_TRAIT_SPEC, "maybe")).is_err());
    }
}
