// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Loading
//!
//! Strongly typed configuration for every Cortex daemon, loaded in layers:
//! an optional configuration file (`cortex.yaml` or `cortex.toml`), then
//! `CORTEX_`-prefixed environment variables (`CORTEX_DATABASE__URL`
//! overrides `database.url`).
//!
//! Configuration is immutable after startup. In particular the pipeline
//! definitions are parsed once into [`cortex_domain::PipelineConfig`]
//! values at construction; reconfiguration means restarting the daemon,
//! which replaces the whole pipeline atomically.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use cortex_domain::{PipelineConfig, SchedulerError, StepConfig};

/// Relational cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://cortex.db`.
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://cortex.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// HTTP delegation API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bind address of the scheduler API, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_api_bind")]
    pub bind: String,
}

fn default_api_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { bind: default_api_bind() }
    }
}

/// Trigger bus settings.
///
/// When disabled, daemons fall back to the in-process bus, which is only
/// meaningful for single-binary deployments and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    "cortex".to_string()
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_mqtt_client_id(),
        }
    }
}

/// Data-source syncer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds between sync rounds per source.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Base URL of the compute inventory endpoint (read-only).
    #[serde(default)]
    pub compute_url: Option<String>,
    /// Base URL of the telemetry endpoint (read-only).
    #[serde(default)]
    pub telemetry_url: Option<String>,
}

fn default_sync_interval() -> u64 {
    300
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            compute_url: None,
            telemetry_url: None,
        }
    }
}

/// Extractor runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Bound on concurrently running extractors.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Explicit enable list; absent means all registered extractors.
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
}

fn default_parallelism() -> usize {
    4
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            enabled: None,
        }
    }
}

/// Descheduler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeschedulerConfig {
    /// Seconds between descheduling cycles.
    #[serde(default = "default_descheduler_interval")]
    pub interval_secs: u64,
    /// Log intended moves without issuing them.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// Per-workload settle timeout in seconds.
    #[serde(default = "default_workload_timeout")]
    pub workload_timeout_secs: u64,
    /// Number of recent hops the cycle detector inspects.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_descheduler_interval() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_workload_timeout() -> u64 {
    300
}

fn default_history_window() -> usize {
    8
}

impl Default for DeschedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_descheduler_interval(),
            dry_run: default_true(),
            workload_timeout_secs: default_workload_timeout(),
            history_window: default_history_window(),
        }
    }
}

/// KPI exporter settings.
#[derive(Debug, Clone, Deserialize)]
pub struct KpiConfig {
    #[serde(default = "default_kpi_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_kpi_bind")]
    pub bind: String,
}

fn default_kpi_interval() -> u64 {
    60
}

fn default_kpi_bind() -> String {
    "127.0.0.1:8081".to_string()
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_kpi_interval(),
            bind: default_kpi_bind(),
        }
    }
}

/// One configured step: a registered name plus its raw options.
#[derive(Debug, Clone, Deserialize)]
pub struct StepEntry {
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// One named pipeline definition for a scheduling domain.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineEntry {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepEntry>,
    #[serde(default)]
    pub tracing: bool,
}

impl PipelineEntry {
    /// Converts this entry into a validated domain pipeline config.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, SchedulerError> {
        let steps = self
            .steps
            .iter()
            .map(|s| StepConfig {
                name: s.name.clone(),
                options: s.options.clone(),
                activation: None,
            })
            .collect();
        Ok(PipelineConfig::new(self.name.clone(), steps)?.with_tracing(self.tracing))
    }
}

/// Per-domain pipeline definitions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerDomainsConfig {
    #[serde(default)]
    pub nova: Vec<PipelineEntry>,
    #[serde(default)]
    pub manila: Vec<PipelineEntry>,
    #[serde(default)]
    pub cinder: Vec<PipelineEntry>,
    #[serde(default)]
    pub machines: Vec<PipelineEntry>,
    #[serde(default)]
    pub pods: Vec<PipelineEntry>,
}

/// Root configuration for all Cortex daemons.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub descheduler: DeschedulerConfig,
    #[serde(default)]
    pub kpis: KpiConfig,
    #[serde(default)]
    pub scheduler: SchedulerDomainsConfig,
}

impl CortexConfig {
    /// Loads configuration from an optional file plus `CORTEX_` env vars.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the file is malformed or a value fails
    /// to deserialize into the typed configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, SchedulerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else {
            builder = builder.add_source(config::File::with_name("cortex").required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CORTEX")
                .separator("__")
                .try_parsing(true),
        );
        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| SchedulerError::invalid_config(format!("failed to load configuration: {}", e)))
    }

    /// The default compute pipeline used when none is configured.
    pub fn default_nova_pipeline() -> PipelineEntry {
        PipelineEntry {
            name: "default".to_string(),
            steps: vec![
                StepEntry {
                    name: "host_instructions".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "project_aggregates".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "status_filter".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "binpacking".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "avoid_overloaded_cpu".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "avoid_overloaded_memory".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "anti_affinity_noisy_projects".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "avoid_contended_hosts".to_string(),
                    options: BTreeMap::new(),
                },
            ],
            tracing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = CortexConfig::default();
        assert_eq!(config.database.url, "sqlite://cortex.db");
        assert!(config.descheduler.dry_run);
        assert!(config.extractor.parallelism > 0);
        assert!(!config.mqtt.enabled);
    }

    #[test]
    fn test_pipeline_entry_converts_and_validates() {
        let entry = CortexConfig::default_nova_pipeline();
        let pipeline = entry.to_pipeline_config().unwrap();
        assert_eq!(pipeline.name, "default");
        assert_eq!(pipeline.steps.len(), 8);
    }

    #[test]
    fn test_duplicate_step_in_entry_rejected() {
        let entry = PipelineEntry {
            name: "p".to_string(),
            steps: vec![
                StepEntry {
                    name: "binpacking".to_string(),
                    options: BTreeMap::new(),
                },
                StepEntry {
                    name: "binpacking".to_string(),
                    options: BTreeMap::new(),
                },
            ],
            tracing: false,
        };
        assert!(entry.to_pipeline_config().is_err());
    }
}
