// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # System Signal Handling
//!
//! Maps process signals onto the shutdown coordinator. The handler
//! reports *which* signal arrived ([`ShutdownSignal`]) so the shutdown
//! log distinguishes an orchestrator-driven SIGTERM from an operator's
//! Ctrl+C; [`drive_shutdown`] is the one-liner the daemons spawn to tie
//! a signal source to the coordinator's drain.
//!
//! The signal source is a trait so tests can stand in a deterministic
//! source instead of raising real signals.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::shutdown::ShutdownCoordinator;

/// The signal that asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM (15): orchestrated shutdown request.
    Terminate,
    /// SIGINT (2): user interrupt, Ctrl+C.
    Interrupt,
    /// SIGHUP (1): controlling terminal closed (Unix only).
    Hangup,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Hangup => "SIGHUP",
        };
        write!(f, "{}", name)
    }
}

/// Source of shutdown signals, abstracted for testing.
pub trait SystemSignals: Send + Sync {
    /// Resolves when a shutdown signal arrives, reporting which one.
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>>;
}

/// Waits for the first shutdown signal, then starts the coordinator's
/// drain. Every Cortex daemon spawns this next to its main loop.
pub async fn drive_shutdown<S: SystemSignals>(signals: S, coordinator: &ShutdownCoordinator) {
    let signal = signals.wait_for_signal().await;
    tracing::info!(%signal, "shutdown signal received, draining Cortex daemons");
    coordinator.initiate_shutdown();
}

/// Deterministic signal source for tests: resolves immediately with a
/// fixed signal.
pub struct ImmediateSignal(pub ShutdownSignal);

impl SystemSignals for ImmediateSignal {
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>> {
        let signal = self.0;
        Box::pin(async move { signal })
    }
}

/// Unix signal source: SIGTERM, SIGINT, and SIGHUP.
#[cfg(unix)]
pub struct UnixSignalHandler;

#[cfg(unix)]
impl UnixSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl Default for UnixSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl SystemSignals for UnixSignalHandler {
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>> {
        Box::pin(async {
            use tokio::signal::unix::{signal, SignalKind};

            let streams = (
                signal(SignalKind::terminate()),
                signal(SignalKind::interrupt()),
                signal(SignalKind::hangup()),
            );
            match streams {
                (Ok(mut terminate), Ok(mut interrupt), Ok(mut hangup)) => {
                    tokio::select! {
                        _ = terminate.recv() => ShutdownSignal::Terminate,
                        _ = interrupt.recv() => ShutdownSignal::Interrupt,
                        _ = hangup.recv() => ShutdownSignal::Hangup,
                    }
                }
                _ => {
                    // Per-signal streams could not be installed; Ctrl+C
                    // still reaches us through the portable handler.
                    tracing::error!("failed to install unix signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    ShutdownSignal::Interrupt
                }
            }
        })
    }
}

/// Windows signal source: Ctrl+C only.
#[cfg(windows)]
pub struct WindowsSignalHandler;

#[cfg(windows)]
impl WindowsSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(windows)]
impl Default for WindowsSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(windows)]
impl SystemSignals for WindowsSignalHandler {
    fn wait_for_signal(&self) -> Pin<Box<dyn Future<Output = ShutdownSignal> + Send + '_>> {
        Box::pin(async {
            let _ = tokio::signal::ctrl_c().await;
            ShutdownSignal::Interrupt
        })
    }
}

#[cfg(unix)]
pub use self::UnixSignalHandler as PlatformSignalHandler;
#[cfg(windows)]
pub use self::WindowsSignalHandler as PlatformSignalHandler;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_signal_reports_its_signal() {
        let source = ImmediateSignal(ShutdownSignal::Hangup);
        assert_eq!(source.wait_for_signal().await, ShutdownSignal::Hangup);
    }

    #[tokio::test]
    async fn test_drive_shutdown_initiates_the_drain() {
        let coordinator = ShutdownCoordinator::default();
        let token = coordinator.token();

        drive_shutdown(ImmediateSignal(ShutdownSignal::Terminate), &coordinator).await;

        assert!(coordinator.is_shutting_down());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_drive_shutdown_through_the_trait_object_seam() {
        // The daemons hold the platform handler through the trait; make
        // sure a boxed source drives the coordinator the same way.
        let coordinator = ShutdownCoordinator::default();
        let source: Box<dyn SystemSignals> = Box::new(ImmediateSignal(ShutdownSignal::Interrupt));
        let signal = source.wait_for_signal().await;
        assert_eq!(signal, ShutdownSignal::Interrupt);
        coordinator.initiate_shutdown();
        assert!(coordinator.is_shutting_down());
    }

    #[test]
    fn test_platform_handler_is_constructible() {
        let _handler = PlatformSignalHandler::new();
        let _default = PlatformSignalHandler::default();
    }

    #[test]
    fn test_signal_display_names() {
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownSignal::Hangup.to_string(), "SIGHUP");
    }
}
