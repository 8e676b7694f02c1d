// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Feature Store
//!
//! The materialized feature cache: extractors write whole table
//! generations into it, scheduling steps read them back through the
//! domain's [`KnowledgeStore`] port.
//!
//! ## Write model
//!
//! [`SqliteFeatureStore::replace_all`] rewrites one table inside a single
//! transaction (`DELETE` + batch `INSERT` + generation marker update), so
//! readers always observe one atomic generation per table. There is
//! deliberately no cross-table transaction: stale cross-table views are
//! acceptable, blocking the scheduling path is not.
//!
//! ## Typing model
//!
//! Rows are typed by their [`FeatureRecord`] declaration and bridged
//! through serde: serialized field names equal column names. The generic
//! write/read machinery therefore works for every extractor without a
//! per-table repository.
//!
//! ## Registration
//!
//! Each extractor registers its record type once at init. Registration
//! creates the table and indexes idempotently and rejects table-name
//! collisions across extractors.

use parking_lot::Mutex;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::collections::BTreeSet;

use async_trait::async_trait;
use cortex_domain::repositories::{FeatureRecord, KnowledgeStore};
use cortex_domain::SchedulerError;

/// SQLite-backed feature cache.
pub struct SqliteFeatureStore {
    pool: SqlitePool,
    registered: Mutex<BTreeSet<String>>,
}

impl SqliteFeatureStore {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            registered: Mutex::new(BTreeSet::new()),
        }
    }

    /// Creates an in-memory store (tests and single-shot tools).
    pub async fn in_memory() -> Result<Self, SchedulerError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to create in-memory database: {}", e)))?;
        Ok(Self::new(pool))
    }

    /// The underlying pool, for extractors that query the data-source
    /// cache directly.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Registers a feature record type: creates table and indexes
    /// idempotently and claims the table name.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when another record already claimed the
    /// table name; `CacheError` on DDL failure.
    pub async fn register<T: FeatureRecord>(&self) -> Result<(), SchedulerError> {
        validate_identifier(T::TABLE)?;
        {
            let mut registered = self.registered.lock();
            if !registered.insert(T::TABLE.to_string()) {
                return Err(SchedulerError::invalid_config(format!(
                    "feature table {} is registered twice",
                    T::TABLE
                )));
            }
        }
        sqlx::query(T::schema())
            .execute(&self.pool)
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to create table {}: {}", T::TABLE, e)))?;
        for index in T::indexes() {
            sqlx::query(index)
                .execute(&self.pool)
                .await
                .map_err(|e| SchedulerError::cache_error(format!("failed to create index on {}: {}", T::TABLE, e)))?;
        }
        // The generation marker table may not exist when the store is used
        // standalone (in-memory tests); the migrate path also creates it.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS feature_generations (
                table_name TEXT PRIMARY KEY,
                written_at TEXT NOT NULL,
                row_count INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::cache_error(format!("failed to create feature_generations: {}", e)))?;
        Ok(())
    }

    /// Tables registered so far, for KPI surfaces.
    pub fn registered_tables(&self) -> Vec<String> {
        self.registered.lock().iter().cloned().collect()
    }

    /// Atomically replaces the whole content of `T`'s table.
    ///
    /// Returns the number of rows in the new generation.
    pub async fn replace_all<T: FeatureRecord>(&self, rows: &[T]) -> Result<u64, SchedulerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to begin transaction: {}", e)))?;

        sqlx::query(&format!("DELETE FROM {}", T::TABLE))
            .execute(&mut *tx)
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to clear table {}: {}", T::TABLE, e)))?;

        // Serialize up front; all rows share one record type, so the
        // first row's keys define the column list for every insert.
        let mut objects = Vec::with_capacity(rows.len());
        for row in rows {
            let value = serde_json::to_value(row)?;
            match value {
                serde_json::Value::Object(object) => objects.push(object),
                _ => {
                    return Err(SchedulerError::internal_error(format!(
                        "feature record for {} is not a JSON object",
                        T::TABLE
                    )))
                }
            }
        }

        if let Some(first) = objects.first() {
            let columns: Vec<&str> = first.keys().map(String::as_str).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let insert_sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                T::TABLE,
                columns.join(", "),
                placeholders
            );

            for object in &objects {
                let mut query = sqlx::query(&insert_sql);
                for field in object.values() {
                    query = bind_json_value(query, field)?;
                }
                query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| SchedulerError::cache_error(format!("failed to insert into {}: {}", T::TABLE, e)))?;
            }
        }

        sqlx::query(
            "INSERT INTO feature_generations (table_name, written_at, row_count) VALUES (?, ?, ?) \
             ON CONFLICT(table_name) DO UPDATE SET written_at = excluded.written_at, row_count = excluded.row_count",
        )
        .bind(T::TABLE)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(rows.len() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| SchedulerError::cache_error(format!("failed to update generation marker: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to commit {} generation: {}", T::TABLE, e)))?;

        Ok(rows.len() as u64)
    }

    /// Row count of one feature table.
    pub async fn row_count(&self, table: &str) -> Result<i64, SchedulerError> {
        validate_identifier(table)?;
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to count rows of {}: {}", table, e)))
    }

    /// Age in seconds of the last written generation, if any.
    pub async fn generation_age_seconds(&self, table: &str) -> Result<Option<f64>, SchedulerError> {
        let written_at: Option<String> =
            sqlx::query_scalar("SELECT written_at FROM feature_generations WHERE table_name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SchedulerError::cache_error(format!("failed to read generation marker: {}", e)))?;
        match written_at {
            None => Ok(None),
            Some(text) => {
                let written = chrono::DateTime::parse_from_rfc3339(&text).map_err(|e| {
                    SchedulerError::cache_error(format!("malformed generation timestamp for {}: {}", table, e))
                })?;
                let age = chrono::Utc::now().signed_duration_since(written.with_timezone(&chrono::Utc));
                Ok(Some(age.num_milliseconds() as f64 / 1000.0))
            }
        }
    }
}

#[async_trait]
impl KnowledgeStore for SqliteFeatureStore {
    async fn fetch_rows(&self, table: &str) -> Result<Vec<serde_json::Value>, SchedulerError> {
        validate_identifier(table)?;
        let rows = sqlx::query(&format!("SELECT * FROM {}", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchedulerError::cache_error(format!("failed to read feature table {}: {}", table, e)))?;
        rows.iter().map(row_to_json).collect()
    }
}

/// Rejects table names that are not plain identifiers.
///
/// Table names are compile-time constants of feature records, but the
/// store refuses to interpolate anything else into SQL.
fn validate_identifier(name: &str) -> Result<(), SchedulerError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(SchedulerError::invalid_config(format!(
            "invalid table identifier {:?}",
            name
        )))
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Binds one JSON field with the matching SQLite type.
fn bind_json_value<'q>(
    query: SqliteQuery<'q>,
    value: &'q serde_json::Value,
) -> Result<SqliteQuery<'q>, SchedulerError> {
    use serde_json::Value;
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                return Err(SchedulerError::internal_error(format!(
                    "unrepresentable numeric feature value {}",
                    n
                )));
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => {
            return Err(SchedulerError::internal_error(format!(
                "nested feature values are not supported: {}",
                other
            )))
        }
    })
}

/// Converts one SQLite row into a JSON object keyed by column name.
fn row_to_json(row: &SqliteRow) -> Result<serde_json::Value, SchedulerError> {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row
            .try_get_raw(index)
            .map_err(|e| SchedulerError::cache_error(format!("failed to read column {}: {}", column.name(), e)))?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => serde_json::Value::from(
                    row.try_get::<i64, _>(index)
                        .map_err(|e| malformed_column(column.name(), e))?,
                ),
                "REAL" => serde_json::Value::from(
                    row.try_get::<f64, _>(index)
                        .map_err(|e| malformed_column(column.name(), e))?,
                ),
                "BOOLEAN" => serde_json::Value::from(
                    row.try_get::<bool, _>(index)
                        .map_err(|e| malformed_column(column.name(), e))?,
                ),
                _ => serde_json::Value::from(
                    row.try_get::<String, _>(index)
                        .map_err(|e| malformed_column(column.name(), e))?,
                ),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(serde_json::Value::Object(object))
}

fn malformed_column(column: &str, err: sqlx::Error) -> SchedulerError {
    SchedulerError::cache_error(format!("malformed value in column {}: {}", column, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::repositories::KnowledgeStoreExt;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestFeature {
        host: String,
        score: f64,
        slots: i64,
    }

    impl FeatureRecord for TestFeature {
        const TABLE: &'static str = "feature_test";

        fn schema() -> &'static str {
            "CREATE TABLE IF NOT EXISTS feature_test (
                host TEXT PRIMARY KEY,
                score REAL NOT NULL,
                slots INTEGER NOT NULL
            )"
        }

        fn indexes() -> &'static [&'static str] {
            &["CREATE INDEX IF NOT EXISTS idx_feature_test_score ON feature_test (score)"]
        }
    }

    fn rows() -> Vec<TestFeature> {
        vec![
            TestFeature {
                host: "h1".to_string(),
                score: 0.5,
                slots: 3,
            },
            TestFeature {
                host: "h2".to_string(),
                score: -1.0,
                slots: 0,
            },
        ]
    }

    #[tokio::test]
    async fn test_replace_all_round_trips_typed_rows() {
        let store = SqliteFeatureStore::in_memory().await.unwrap();
        store.register::<TestFeature>().await.unwrap();

        let written = store.replace_all(&rows()).await.unwrap();
        assert_eq!(written, 2);

        let mut fetched: Vec<TestFeature> = store.fetch().await.unwrap();
        fetched.sort_by(|a, b| a.host.cmp(&b.host));
        assert_eq!(fetched, rows());
    }

    #[tokio::test]
    async fn test_replace_all_replaces_previous_generation() {
        let store = SqliteFeatureStore::in_memory().await.unwrap();
        store.register::<TestFeature>().await.unwrap();

        store.replace_all(&rows()).await.unwrap();
        let next = vec![TestFeature {
            host: "h9".to_string(),
            score: 2.0,
            slots: 1,
        }];
        store.replace_all(&next).await.unwrap();

        let fetched: Vec<TestFeature> = store.fetch().await.unwrap();
        assert_eq!(fetched, next);
        assert_eq!(store.row_count(TestFeature::TABLE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let store = SqliteFeatureStore::in_memory().await.unwrap();
        store.register::<TestFeature>().await.unwrap();
        let err = store.register::<TestFeature>().await.unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[tokio::test]
    async fn test_generation_marker_updates() {
        let store = SqliteFeatureStore::in_memory().await.unwrap();
        store.register::<TestFeature>().await.unwrap();
        assert_eq!(store.generation_age_seconds(TestFeature::TABLE).await.unwrap(), None);

        store.replace_all(&rows()).await.unwrap();
        let age = store
            .generation_age_seconds(TestFeature::TABLE)
            .await
            .unwrap()
            .expect("generation written");
        assert!(age >= 0.0 && age < 60.0);
    }

    #[tokio::test]
    async fn test_fetch_from_missing_table_is_cache_error() {
        let store = SqliteFeatureStore::in_memory().await.unwrap();
        let err = store.fetch_rows("feature_absent").await.unwrap_err();
        assert_eq!(err.category(), "cache");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("feature_host_capacity").is_ok());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("bad; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }
}
