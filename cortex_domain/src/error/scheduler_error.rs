// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Hierarchical error system for the Cortex scheduling domain. Every
//! failure the core distinguishes maps onto one variant of
//! [`SchedulerError`]:
//!
//! - **Configuration errors** - unknown step names, invalid option bounds,
//!   disagreeing weights/hosts sets. Abort pipeline construction or reject
//!   a request before any step runs.
//! - **StepSkipped** - the sentinel a step returns to deliberately opt out
//!   of one request (e.g. a create-only step seeing a resize). Swallowed by
//!   the pipeline, never logged as an error.
//! - **Cache errors** - the feature store is unreachable or returned a
//!   malformed row. The request produces no decision.
//! - **Extractor errors** - one extractor run failed; logged with the
//!   extractor name, retried on the next trigger, other extractors are
//!   unaffected.
//! - **Executor errors** - a descheduler move failed; recorded against the
//!   workload, the cycle continues.
//! - **Fatal** - the subsystem cannot initialize (cache unreachable, bus
//!   subscription failed, cyclic trigger topology). Aborts process startup.
//!
//! ## Propagation Policy
//!
//! Step internals recover nothing: they either return the skip sentinel or
//! bubble the error. The pipeline itself never retries; retries are the
//! caller's responsibility.

use thiserror::Error;

/// Domain-specific errors for the scheduling decision engine.
///
/// Each variant carries a descriptive message. Variants are grouped by the
/// subsystem that raises them so callers can handle classes of failure
/// systematically (HTTP status mapping, metrics labels, retry policy).
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Sentinel: the step opted out for this request. Not a failure.
    #[error("Step skipped: {0}")]
    StepSkipped(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Extractor error: {0}")]
    ExtractorError(String),

    #[error("Executor error: {0}")]
    ExecutorError(String),

    #[error("Bus error: {0}")]
    BusError(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    /// Startup cannot proceed; the process exits non-zero.
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl SchedulerError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates the skip sentinel for a step opting out of one request
    pub fn step_skipped(msg: impl Into<String>) -> Self {
        Self::StepSkipped(msg.into())
    }

    /// Creates a new cache error
    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::CacheError(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new extractor error
    pub fn extractor_error(msg: impl Into<String>) -> Self {
        Self::ExtractorError(msg.into())
    }

    /// Creates a new executor error
    pub fn executor_error(msg: impl Into<String>) -> Self {
        Self::ExecutorError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Creates a new fatal startup error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// True for the skip sentinel, which the pipeline swallows.
    pub fn is_skip(&self) -> bool {
        matches!(self, SchedulerError::StepSkipped(_))
    }

    /// True for errors that indicate a retry-able condition.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SchedulerError::TimeoutError(_)
                | SchedulerError::CacheError(_)
                | SchedulerError::BusError(_)
                | SchedulerError::IoError(_)
        )
    }

    /// True for errors the caller provoked (mapped to HTTP 400).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::ValidationError(_)
                | SchedulerError::InvalidConfiguration(_)
                | SchedulerError::PipelineNotFound(_)
        )
    }

    /// Gets the error category used as a metrics label.
    pub fn category(&self) -> &'static str {
        match self {
            SchedulerError::InvalidConfiguration(_) => "configuration",
            SchedulerError::UnknownStep(_) => "configuration",
            SchedulerError::ValidationError(_) => "validation",
            SchedulerError::StepSkipped(_) => "skipped",
            SchedulerError::CacheError(_) => "cache",
            SchedulerError::DatabaseError(_) => "database",
            SchedulerError::SerializationError(_) => "serialization",
            SchedulerError::ExtractorError(_) => "extractor",
            SchedulerError::ExecutorError(_) => "executor",
            SchedulerError::BusError(_) => "bus",
            SchedulerError::PipelineNotFound(_) => "pipeline",
            SchedulerError::TimeoutError(_) => "timeout",
            SchedulerError::Cancelled(_) => "cancellation",
            SchedulerError::IoError(_) => "io",
            SchedulerError::InternalError(_) => "internal",
            SchedulerError::MetricsError(_) => "metrics",
            SchedulerError::Fatal(_) => "fatal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::SerializationError(err.to_string())
    }
}

// NOTE: sqlx and transport error conversions live in the infrastructure
// layer. The domain only needs JSON serialization for step options and
// feature row bridging.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_sentinel_is_not_recoverable_or_caller_error() {
        let skip = SchedulerError::step_skipped("resize is not handled by this step");
        assert!(skip.is_skip());
        assert!(!skip.is_recoverable());
        assert!(!skip.is_caller_error());
    }

    #[test]
    fn test_validation_maps_to_caller_error() {
        let err = SchedulerError::validation("weight assigned to unknown host h9");
        assert!(err.is_caller_error());
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_cache_error_is_recoverable() {
        assert!(SchedulerError::cache_error("connection refused").is_recoverable());
        assert!(!SchedulerError::fatal("cyclic trigger topology").is_recoverable());
    }

    #[test]
    fn test_display_includes_message() {
        let err = SchedulerError::UnknownStep("no_such_weigher".into());
        assert_eq!(err.to_string(), "Unknown step: no_such_weigher");
    }
}
