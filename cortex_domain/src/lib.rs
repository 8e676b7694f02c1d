// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex Domain
//!
//! The domain layer of the Cortex scheduling decision engine: the pure
//! business rules of turning a set of candidate hosts and seed weights
//! into an ordered placement decision. It is independent of databases,
//! message brokers, HTTP transports, and user interfaces.
//!
//! ## Core concepts
//!
//! ### Entities
//! - [`entities::ComputeRequest`], [`entities::ShareRequest`],
//!   [`entities::VolumeRequest`], [`entities::MachineRequest`],
//!   [`entities::PodRequest`]: the per-domain placement requests, all
//!   satisfying the [`entities::PlacementRequest`] capability trait.
//! - [`entities::PipelineConfig`]: the ordered, validated step list of
//!   one named pipeline.
//! - [`entities::DeschedulingDecision`]: the audit record of one
//!   descheduler move.
//!
//! ### Value objects
//! - [`value_objects::StepResult`] and
//!   [`value_objects::ActivationFunction`]: what a step returns and how
//!   its raw activations are folded into the running weights.
//! - [`value_objects::MinMaxScale`]: the uniform numeric shaping of every
//!   weigher, validated at init so run paths never divide by zero.
//! - [`value_objects::VmIntent`], [`value_objects::HypervisorType`],
//!   [`value_objects::FlavorClass`]: the request-derived dispatch enums.
//! - [`value_objects::MigrationHistory`]: the per-workload visit list the
//!   cycle detector inspects.
//!
//! ### Services (plugin seams)
//! - [`services::SchedulerStep`]: one filter or weigher of a pipeline.
//! - [`services::FeatureExtractor`]: trigger-driven producer of one
//!   feature table.
//! - [`services::DecisionStep`] and [`services::WorkloadMover`]: the
//!   descheduler's proposal and execution seams.
//! - [`services::DataSource`]: one periodically-synced cache slice.
//!
//! ### Repositories (infrastructure ports)
//! - [`repositories::KnowledgeStore`]: read-only access to the feature
//!   cache on the scheduling path.
//! - [`repositories::FeatureRecord`]: typed feature table rows with
//!   declared schema and indexes.
//! - [`repositories::DecisionRepository`]: decisions and migration
//!   history.
//!
//! ## Invariants enforced here
//!
//! - Ordered hosts are always a subset of the request's candidates, in
//!   descending final weight, with ties stable by input order.
//! - Seed weights must cover exactly the candidate set (or be absent).
//! - Activation `0.0` means "kept, unchanged"; an absent host means
//!   "filtered out".
//! - Min-max bounds are unequal and finite by construction.
//! - The declared trigger topology is acyclic.

pub mod entities;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
pub use entities::{
    ComputeFlags, ComputeRequest, ComputeSpec, DeschedulingDecision, Flavor, HostCandidate, HostInstructions,
    MachineRequest, MachineSpec, MoveOutcome, PipelineConfig, PlacementRequest, PodRequest, PodSpec,
    ShareRequest, ShareSpec, StepConfig, VolumeRequest, VolumeSpec,
};
pub use error::SchedulerError;
pub use value_objects::{
    scale, ActivationFunction, FlavorClass, HypervisorType, MigrationHistory, MigrationHop, MinMaxScale,
    PipelineResult, StepOptions, StepResult, StepStatistics, StepTraceRecord, VmIntent,
};
