// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex
//!
//! An external scheduling decision engine for OpenStack-like clouds. The
//! compute, share, and block services (and a machine-provisioning
//! controller) delegate their host-selection step here: given candidate
//! hosts and seed weights, Cortex returns an ordered host list. A sibling
//! descheduler proposes moves for known-bad placements.
//!
//! ## Layering
//!
//! - [`cortex_domain`] - pure business rules: requests, activations,
//!   step/extractor contracts, the error system.
//! - [`application`] - the pipelines and long-running loops: scheduling
//!   pipeline execution, the trigger-driven extractor runtime, the
//!   descheduler, the syncer, KPI sampling.
//! - [`infrastructure`] - sqlite feature store, MQTT/in-process trigger
//!   bus, concrete steps and extractors, configuration, metrics, logging.
//! - [`presentation`] - the HTTP delegation API.
//!
//! Data flows bottom-up: data sources fill the relational cache and fire
//! triggers; extractors rewrite feature tables and announce them; the
//! scheduling pipelines read those tables while serving placement
//! requests on the live API path.

pub mod application;
pub mod infrastructure;
pub mod presentation;
