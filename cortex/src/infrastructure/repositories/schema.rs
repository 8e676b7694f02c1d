// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite schema helpers shared by the repository implementations.
//!
//! Applies the cache and bookkeeping DDL on start-up so integration tests
//! and daemons see a consistent database. Feature tables are *not* listed
//! here: each extractor creates its own table idempotently at init, which
//! keeps the table schema next to the code that owns it.

use sqlx::migrate::MigrateDatabase;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Data-source cache and bookkeeping tables.
///
/// Statements are idempotent and applied in order.
const SCHEMA: &[&str] = &[
    // Hypervisor inventory as last synced from the compute service.
    "CREATE TABLE IF NOT EXISTS cache_hypervisors (
        service_host TEXT PRIMARY KEY,
        hypervisor_hostname TEXT NOT NULL,
        state TEXT,
        memory_mb INTEGER NOT NULL,
        memory_used_mb INTEGER NOT NULL,
        vcpus INTEGER NOT NULL,
        vcpus_used INTEGER NOT NULL,
        local_disk_gb INTEGER NOT NULL,
        local_disk_used_gb INTEGER NOT NULL
    )",
    // Host aggregates with tenant restrictions.
    "CREATE TABLE IF NOT EXISTS cache_aggregates (
        aggregate TEXT NOT NULL,
        service_host TEXT NOT NULL,
        project_id TEXT,
        PRIMARY KEY (aggregate, service_host)
    )",
    "CREATE INDEX IF NOT EXISTS idx_cache_aggregates_host ON cache_aggregates (service_host)",
    // Server (VM) inventory.
    "CREATE TABLE IF NOT EXISTS cache_servers (
        id TEXT PRIMARY KEY,
        name TEXT,
        project_id TEXT NOT NULL,
        host TEXT NOT NULL,
        status TEXT,
        flavor_vcpus INTEGER NOT NULL,
        flavor_memory_mb INTEGER NOT NULL,
        flavor_disk_gb INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_cache_servers_host ON cache_servers (host)",
    "CREATE INDEX IF NOT EXISTS idx_cache_servers_project ON cache_servers (project_id)",
    // Telemetry samples, one row per host and metric.
    "CREATE TABLE IF NOT EXISTS cache_telemetry (
        host TEXT NOT NULL,
        metric TEXT NOT NULL,
        avg REAL NOT NULL,
        max REAL NOT NULL,
        PRIMARY KEY (host, metric)
    )",
    // One generation marker per feature table, maintained by replace-all.
    "CREATE TABLE IF NOT EXISTS feature_generations (
        table_name TEXT PRIMARY KEY,
        written_at TEXT NOT NULL,
        row_count INTEGER NOT NULL
    )",
    // Descheduler audit trail.
    "CREATE TABLE IF NOT EXISTS descheduler_decisions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workload_id TEXT NOT NULL,
        step_name TEXT NOT NULL,
        decided_at TEXT NOT NULL,
        executed INTEGER NOT NULL,
        outcome TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_decisions_workload ON descheduler_decisions (workload_id)",
    // Migration history consumed by the cycle detector.
    "CREATE TABLE IF NOT EXISTS migration_hops (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workload_id TEXT NOT NULL,
        source_host TEXT NOT NULL,
        dest_host TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_migration_hops_workload ON migration_hops (workload_id)",
];

/// Applies pending DDL against the provided SQLite pool.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring database schema is up to date");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema is up to date");
    Ok(())
}

/// Creates a new SQLite database file if it doesn't exist.
///
/// `SqlitePool::connect` fails on a missing file, so daemons call this
/// first during startup.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("Database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("Created new SQLite database: {}", database_url);
    } else {
        debug!("Database already exists: {}", database_url);
    }
    Ok(())
}

/// Creates the database when missing, connects, and applies the schema.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;

    let pool = SqlitePool::connect(database_url).await?;

    ensure_schema(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let tables: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'cache_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 4);
    }

    #[tokio::test]
    async fn test_decision_tables_exist() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let count: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
             AND name IN ('descheduler_decisions', 'migration_hops', 'feature_generations')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 3);
    }
}
