// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data Source Contract
//!
//! The leaves of the knowledge substrate. A data source periodically
//! ingests one slice of cloud inventory or telemetry into the relational
//! cache and announces completion on its trigger topic, which is what
//! sets the downstream extractors in motion. The source-of-truth APIs
//! themselves are external, read-only collaborators.

use async_trait::async_trait;

use crate::error::SchedulerError;

/// One periodically-synced slice of upstream inventory or telemetry.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Identifier stable in configuration, logs, and metrics labels.
    fn name(&self) -> &'static str;

    /// Topic published after each completed sync.
    fn topic(&self) -> &'static str;

    /// Ingests the source into the cache, replacing the previous state.
    ///
    /// Returns the number of rows ingested.
    async fn sync(&self) -> Result<u64, SchedulerError>;
}
