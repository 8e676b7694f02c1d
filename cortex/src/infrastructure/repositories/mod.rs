// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite-backed implementations of the domain's repository ports.

pub mod decision_store;
pub mod feature_store;
pub mod schema;

pub use decision_store::SqliteDecisionStore;
pub use feature_store::SqliteFeatureStore;
