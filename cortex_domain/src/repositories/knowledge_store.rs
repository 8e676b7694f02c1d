// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Knowledge Store Port
//!
//! Read access to the materialized feature cache, as seen by scheduling
//! steps. The scheduling path is read-only: steps fetch whole feature
//! tables (they are small, per-host aggregates) and filter in memory,
//! which keeps reads snapshot-consistent per table without ever blocking
//! the extractor writers.
//!
//! The object-safe surface works in JSON rows; the [`KnowledgeStoreExt`]
//! extension recovers typed records via their [`FeatureRecord`]
//! declaration.

use async_trait::async_trait;

use crate::error::SchedulerError;
use crate::repositories::feature_record::FeatureRecord;

/// Read-only port onto the feature cache.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Fetches every row of a feature table as a JSON object per row.
    ///
    /// # Errors
    ///
    /// `CacheError` when the store is unreachable or a row cannot be
    /// represented (the request then produces no decision).
    async fn fetch_rows(&self, table: &str) -> Result<Vec<serde_json::Value>, SchedulerError>;
}

/// Typed fetch helpers over any [`KnowledgeStore`].
#[async_trait]
pub trait KnowledgeStoreExt: KnowledgeStore {
    /// Fetches every row of `T`'s table, deserialized into `T`.
    async fn fetch<T: FeatureRecord>(&self) -> Result<Vec<T>, SchedulerError> {
        let rows = self.fetch_rows(T::TABLE).await?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulerError::cache_error(format!("malformed row in feature table {}: {}", T::TABLE, e))
                })
            })
            .collect()
    }
}

impl<S: KnowledgeStore + ?Sized> KnowledgeStoreExt for S {}
