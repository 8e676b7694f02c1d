// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Repository ports of the scheduling domain. Concrete sqlite-backed
//! implementations live in the infrastructure layer.

pub mod decision_repository;
pub mod feature_record;
pub mod knowledge_store;

pub use decision_repository::DecisionRepository;
pub use feature_record::FeatureRecord;
pub use knowledge_store::{KnowledgeStore, KnowledgeStoreExt};
