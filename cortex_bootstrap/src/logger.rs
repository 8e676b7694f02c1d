// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Logger
//!
//! Lightweight logging abstraction for the bootstrap phase.
//!
//! Configuration parsing and subsystem wiring happen before the tracing
//! subscriber is installed, so those paths log through this minimal trait
//! instead. The console implementation routes into `tracing` once the
//! subscriber exists; the no-op implementation keeps unit tests quiet.

/// Bootstrap logging abstraction
///
/// Implementations can use tracing, plain stderr, or custom backends.
pub trait BootstrapLogger: Send + Sync {
    /// Log a fatal error during bootstrap that will cause termination.
    fn error(&self, message: &str);

    /// Log a non-fatal issue that may affect operation.
    fn warn(&self, message: &str);

    /// Log a normal bootstrap progress message.
    fn info(&self, message: &str);

    /// Log detailed diagnostic information during bootstrap.
    fn debug(&self, message: &str);
}

/// Console logger implementation routing through the tracing crate.
pub struct ConsoleLogger {
    prefix: String,
}

impl ConsoleLogger {
    /// Create a new console logger with the default `bootstrap` prefix.
    pub fn new() -> Self {
        Self::with_prefix("bootstrap")
    }

    /// Create a new console logger with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapLogger for ConsoleLogger {
    fn error(&self, message: &str) {
        tracing::error!("[{}] {}", self.prefix, message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("[{}] {}", self.prefix, message);
    }

    fn info(&self, message: &str) {
        tracing::info!("[{}] {}", self.prefix, message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!("[{}] {}", self.prefix, message);
    }
}

/// No-op logger for tests and silent operation.
pub struct NoopLogger;

impl BootstrapLogger for NoopLogger {
    fn error(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}
