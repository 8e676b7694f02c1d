// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex Bootstrap
//!
//! Process-level concerns for the Cortex daemons, kept separate from the
//! scheduling domain and its infrastructure:
//!
//! - **Exit codes** - standardized Unix exit codes (BSD `sysexits.h`)
//! - **Bootstrap logging** - a minimal logging seam usable before the
//!   tracing subscriber is installed
//! - **Shutdown coordination** - cancellation tokens plus a drain ledger
//!   of named subsystems, so a stuck daemon is named when the grace
//!   period runs out
//! - **Signal handling** - SIGTERM/SIGINT/SIGHUP mapped onto the
//!   coordinator's drain
//!
//! Every long-running subsystem (scheduler API, extractor runtime, syncer,
//! descheduler, KPI loops) registers itself with the
//! [`shutdown::ShutdownCoordinator`], observes its
//! [`shutdown::CancellationToken`], and drops its
//! [`shutdown::SubsystemHandle`] once it has drained.

pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use exit_code::ExitCode;
pub use logger::{BootstrapLogger, ConsoleLogger, NoopLogger};
pub use shutdown::{CancellationToken, ShutdownCoordinator, SubsystemHandle};
pub use signals::{drive_shutdown, ImmediateSignal, PlatformSignalHandler, ShutdownSignal, SystemSignals};
