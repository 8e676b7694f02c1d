// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Decision Store
//!
//! Persistence for descheduling decisions and migration history. The
//! executor is the single writer; the cycle detector and audit surfaces
//! read. Outcomes are stored as JSON so the audit trail survives enum
//! evolution without migrations.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use cortex_domain::repositories::DecisionRepository;
use cortex_domain::{DeschedulingDecision, MigrationHistory, MigrationHop, SchedulerError};

/// SQLite-backed [`DecisionRepository`].
pub struct SqliteDecisionStore {
    pool: SqlitePool,
}

impl SqliteDecisionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepository for SqliteDecisionStore {
    async fn record_decision(&self, decision: &DeschedulingDecision) -> Result<(), SchedulerError> {
        let outcome = serde_json::to_string(&decision.outcome)?;
        sqlx::query(
            "INSERT INTO descheduler_decisions (workload_id, step_name, decided_at, executed, outcome) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&decision.workload_id)
        .bind(&decision.step_name)
        .bind(decision.decided_at.to_rfc3339())
        .bind(decision.executed)
        .bind(outcome)
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::database_error(format!("failed to record decision: {}", e)))?;
        Ok(())
    }

    async fn record_migration(
        &self,
        workload_id: &str,
        source_host: &str,
        dest_host: &str,
    ) -> Result<(), SchedulerError> {
        sqlx::query(
            "INSERT INTO migration_hops (workload_id, source_host, dest_host, recorded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(workload_id)
        .bind(source_host)
        .bind(dest_host)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::database_error(format!("failed to record migration hop: {}", e)))?;
        Ok(())
    }

    async fn migration_history(&self, workload_id: &str, window: usize) -> Result<MigrationHistory, SchedulerError> {
        let rows = sqlx::query(
            "SELECT source_host, dest_host, recorded_at FROM migration_hops \
             WHERE workload_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(workload_id)
        .bind(window as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SchedulerError::database_error(format!("failed to read migration history: {}", e)))?;

        // Rows arrive newest first; the visit list wants oldest first.
        let mut hops: Vec<MigrationHop> = rows
            .into_iter()
            .map(|row| {
                let recorded_at: String = row.get("recorded_at");
                let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|e| {
                        SchedulerError::database_error(format!("malformed migration timestamp: {}", e))
                    })?
                    .with_timezone(&chrono::Utc);
                Ok(MigrationHop {
                    source_host: row.get("source_host"),
                    dest_host: row.get("dest_host"),
                    recorded_at,
                })
            })
            .collect::<Result<Vec<_>, SchedulerError>>()?;
        hops.reverse();

        Ok(MigrationHistory::new(workload_id, hops))
    }

    async fn recent_decisions(&self, limit: usize) -> Result<Vec<DeschedulingDecision>, SchedulerError> {
        let rows = sqlx::query(
            "SELECT workload_id, step_name, decided_at, executed, outcome FROM descheduler_decisions \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SchedulerError::database_error(format!("failed to read decisions: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                let decided_at: String = row.get("decided_at");
                let decided_at = chrono::DateTime::parse_from_rfc3339(&decided_at)
                    .map_err(|e| SchedulerError::database_error(format!("malformed decision timestamp: {}", e)))?
                    .with_timezone(&chrono::Utc);
                let outcome: String = row.get("outcome");
                Ok(DeschedulingDecision {
                    workload_id: row.get("workload_id"),
                    step_name: row.get("step_name"),
                    decided_at,
                    executed: row.get("executed"),
                    outcome: serde_json::from_str(&outcome)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema;
    use cortex_domain::MoveOutcome;

    async fn store() -> SqliteDecisionStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        schema::ensure_schema(&pool).await.unwrap();
        SqliteDecisionStore::new(pool)
    }

    #[tokio::test]
    async fn test_decision_round_trip() {
        let store = store().await;
        let decision = DeschedulingDecision::new(
            "vm-1",
            "drain_overloaded_hosts",
            true,
            MoveOutcome::Moved {
                from: "h1".to_string(),
                to: "h2".to_string(),
            },
        );
        store.record_decision(&decision).await.unwrap();

        let recent = store.recent_decisions(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].workload_id, "vm-1");
        assert!(recent[0].succeeded());
    }

    #[tokio::test]
    async fn test_migration_history_is_oldest_first_and_windowed() {
        let store = store().await;
        store.record_migration("vm-1", "h1", "h2").await.unwrap();
        store.record_migration("vm-1", "h2", "h3").await.unwrap();
        store.record_migration("vm-1", "h3", "h4").await.unwrap();
        store.record_migration("vm-other", "x1", "x2").await.unwrap();

        let history = store.migration_history("vm-1", 2).await.unwrap();
        assert_eq!(history.hops.len(), 2);
        assert_eq!(history.hops[0].source_host, "h2");
        assert_eq!(history.hops[1].dest_host, "h4");
        assert!(!history.has_cycle());
    }

    #[tokio::test]
    async fn test_empty_history() {
        let store = store().await;
        let history = store.migration_history("vm-none", 8).await.unwrap();
        assert!(history.hops.is_empty());
        assert!(!history.has_cycle());
    }
}
