// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Feature Extractor Contract
//!
//! A feature extractor owns exactly one feature table: a denormalized,
//! pre-aggregated view over the data-source cache that weigher steps read
//! at scheduling time. Extractors are trigger driven: each subscribes to
//! a set of trigger topics ("data source X synced", "feature Y updated")
//! and recomputes its table whenever any of them fires.
//!
//! ## Consistency model
//!
//! Every run is replace-all: readers always observe one atomic generation
//! of the table, never a partial write. Cross-table joins observe a
//! possibly stale but per-table consistent snapshot; the design
//! deliberately eschews cross-table transactions for throughput.
//!
//! ## Failure model
//!
//! An extractor failure is logged with the extractor name and retried on
//! the next trigger. It never blocks other extractors.

use async_trait::async_trait;

use crate::error::SchedulerError;

/// A trigger-driven producer of one feature table.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Identifier stable in configuration, logs, and metrics labels.
    fn name(&self) -> &'static str;

    /// The feature table this extractor exclusively owns.
    fn table(&self) -> &'static str;

    /// Trigger topics whose firing enqueues a re-run.
    fn triggers(&self) -> &'static [&'static str];

    /// Topic published after each successful table rewrite.
    fn publishes(&self) -> &'static str;

    /// Creates the feature table (idempotently) and validates options.
    async fn init(&self) -> Result<(), SchedulerError>;

    /// Recomputes the table from the data-source cache, replace-all.
    ///
    /// Returns the number of rows in the new generation.
    async fn run(&self) -> Result<u64, SchedulerError>;
}
