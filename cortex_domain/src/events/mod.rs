// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain events: trigger topics and the declared topic topology.

pub mod trigger_events;

pub use trigger_events::{topics, TopicGraph, TriggerEvent};
