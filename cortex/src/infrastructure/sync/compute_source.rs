// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compute Inventory Sources
//!
//! Ingests hypervisor inventory (with host aggregates) and server
//! inventory from the compute service's read-only endpoints into the
//! relational cache. Each completed sync publishes its trigger topic,
//! which is what wakes the downstream extractors.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use cortex_domain::events::topics;
use cortex_domain::services::DataSource;
use cortex_domain::SchedulerError;

/// Hypervisor listing as returned by the compute API.
#[derive(Debug, Deserialize)]
struct HypervisorListing {
    hypervisors: Vec<HypervisorDto>,
}

#[derive(Debug, Deserialize)]
struct HypervisorDto {
    service: HypervisorServiceDto,
    hypervisor_hostname: String,
    #[serde(default)]
    state: Option<String>,
    memory_mb: i64,
    memory_mb_used: i64,
    vcpus: i64,
    vcpus_used: i64,
    local_gb: i64,
    local_gb_used: i64,
}

#[derive(Debug, Deserialize)]
struct HypervisorServiceDto {
    host: String,
}

#[derive(Debug, Deserialize)]
struct AggregateListing {
    aggregates: Vec<AggregateDto>,
}

#[derive(Debug, Deserialize)]
struct AggregateDto {
    name: String,
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

/// Syncs hypervisors and host aggregates into the cache.
pub struct HypervisorSource {
    pool: SqlitePool,
    client: reqwest::Client,
    base_url: String,
}

impl HypervisorSource {
    pub fn new(pool: SqlitePool, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DataSource for HypervisorSource {
    fn name(&self) -> &'static str {
        "hypervisors"
    }

    fn topic(&self) -> &'static str {
        topics::SYNC_HYPERVISORS
    }

    async fn sync(&self) -> Result<u64, SchedulerError> {
        let listing: HypervisorListing = self
            .client
            .get(format!("{}/os-hypervisors/detail", self.base_url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SchedulerError::IoError(format!("hypervisor listing failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SchedulerError::SerializationError(format!("malformed hypervisor listing: {}", e)))?;

        let aggregates: AggregateListing = self
            .client
            .get(format!("{}/os-aggregates", self.base_url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SchedulerError::IoError(format!("aggregate listing failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SchedulerError::SerializationError(format!("malformed aggregate listing: {}", e)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to begin sync transaction: {}", e)))?;

        sqlx::query("DELETE FROM cache_hypervisors")
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        for hv in &listing.hypervisors {
            sqlx::query(
                "INSERT OR REPLACE INTO cache_hypervisors (service_host, hypervisor_hostname, state, \
                 memory_mb, memory_used_mb, vcpus, vcpus_used, local_disk_gb, local_disk_used_gb) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&hv.service.host)
            .bind(&hv.hypervisor_hostname)
            .bind(&hv.state)
            .bind(hv.memory_mb)
            .bind(hv.memory_mb_used)
            .bind(hv.vcpus)
            .bind(hv.vcpus_used)
            .bind(hv.local_gb)
            .bind(hv.local_gb_used)
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        }

        sqlx::query("DELETE FROM cache_aggregates")
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        for aggregate in &aggregates.aggregates {
            let tenant = aggregate.metadata.get("filter_tenant_id");
            for host in &aggregate.hosts {
                sqlx::query(
                    "INSERT OR REPLACE INTO cache_aggregates (aggregate, service_host, project_id) VALUES (?, ?, ?)",
                )
                .bind(&aggregate.name)
                .bind(host)
                .bind(tenant)
                .execute(&mut *tx)
                .await
                .map_err(|e| SchedulerError::database_error(e.to_string()))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to commit sync: {}", e)))?;

        debug!(count = listing.hypervisors.len(), "synced hypervisor inventory");
        Ok(listing.hypervisors.len() as u64)
    }
}

/// Server listing as returned by the compute API.
#[derive(Debug, Deserialize)]
struct ServerListing {
    servers: Vec<ServerDto>,
}

#[derive(Debug, Deserialize)]
struct ServerDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    tenant_id: String,
    #[serde(rename = "OS-EXT-SRV-ATTR:host")]
    host: String,
    #[serde(default)]
    status: Option<String>,
    flavor: ServerFlavorDto,
}

#[derive(Debug, Deserialize)]
struct ServerFlavorDto {
    vcpus: i64,
    ram: i64,
    disk: i64,
}

/// Syncs the server (VM) inventory into the cache.
pub struct ServerSource {
    pool: SqlitePool,
    client: reqwest::Client,
    base_url: String,
}

impl ServerSource {
    pub fn new(pool: SqlitePool, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DataSource for ServerSource {
    fn name(&self) -> &'static str {
        "servers"
    }

    fn topic(&self) -> &'static str {
        topics::SYNC_SERVERS
    }

    async fn sync(&self) -> Result<u64, SchedulerError> {
        let listing: ServerListing = self
            .client
            .get(format!("{}/servers/detail?all_tenants=1", self.base_url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SchedulerError::IoError(format!("server listing failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SchedulerError::SerializationError(format!("malformed server listing: {}", e)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to begin sync transaction: {}", e)))?;

        sqlx::query("DELETE FROM cache_servers")
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        for server in &listing.servers {
            sqlx::query(
                "INSERT OR REPLACE INTO cache_servers (id, name, project_id, host, status, \
                 flavor_vcpus, flavor_memory_mb, flavor_disk_gb) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&server.id)
            .bind(&server.name)
            .bind(&server.tenant_id)
            .bind(&server.host)
            .bind(&server.status)
            .bind(server.flavor.vcpus)
            .bind(server.flavor.ram)
            .bind(server.flavor.disk)
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::database_error(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SchedulerError::database_error(format!("failed to commit sync: {}", e)))?;

        debug!(count = listing.servers.len(), "synced server inventory");
        Ok(listing.servers.len() as u64)
    }
}
