// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Feature Records
//!
//! Trait for typed rows of a feature table. Each extractor declares its
//! record type here: the table name, the SQL schema, and the indexes.
//! Records are bridged through serde so the feature store can write and
//! read them generically: serialized field names must match the schema's
//! column names exactly.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed row of one feature table.
///
/// ## Contract
///
/// - `TABLE` is unique across all extractors; collisions are caught at
///   registration.
/// - `schema()` is an idempotent `CREATE TABLE IF NOT EXISTS` statement
///   whose column names equal the serde field names of the record.
/// - `indexes()` are idempotent `CREATE INDEX IF NOT EXISTS` statements.
pub trait FeatureRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The feature table this record belongs to.
    const TABLE: &'static str;

    /// Idempotent DDL creating the table.
    fn schema() -> &'static str;

    /// Idempotent DDL creating the table's indexes.
    fn indexes() -> &'static [&'static str] {
        &[]
    }
}
