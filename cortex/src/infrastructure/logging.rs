// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Setup
//!
//! Installs the tracing subscriber for all Cortex daemons. The filter is
//! environment driven (`RUST_LOG`), defaulting to `info` for the cortex
//! crates and `warn` elsewhere, so a production deployment is quiet and a
//! debugging session is one env var away.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn,cortex=info,cortex_domain=info,cortex_bootstrap=info";

/// Installs the global tracing subscriber.
///
/// Safe to call once per process; later calls are ignored (tests may race
/// to install it).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
