// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete data sources feeding the relational cache.

pub mod compute_source;
pub mod telemetry_source;

pub use compute_source::{HypervisorSource, ServerSource};
pub use telemetry_source::TelemetrySource;
