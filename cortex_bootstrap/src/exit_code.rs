// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions.
//!
//! The Cortex CLI promises exit 0 on clean shutdown and a non-zero code on
//! configuration or initialization failure. Daemons map their startup errors
//! through [`ExitCode`] so operators and init systems can distinguish a bad
//! configuration file (65) from an unreachable database (69) or an internal
//! fault (70).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cortex_bootstrap::exit_code::ExitCode;
//!
//! fn run_daemon() -> Result<(), Box<dyn std::error::Error>> {
//!     // Daemon logic here
//!     Ok(())
//! }
//!
//! fn main() {
//!     let code = match run_daemon() {
//!         Ok(()) => ExitCode::Success,
//!         Err(_) => ExitCode::Software,
//!     };
//!     std::process::exit(code.as_i32());
//! }
//! ```

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    /// - Invalid arguments
    /// - Unknown subcommand or flags
    UsageError = 64,

    /// Data format error (65)
    /// - Malformed configuration file
    /// - Invalid pipeline definition (unknown step, bad option bounds)
    DataError = 65,

    /// Cannot open input (66)
    /// - Configuration file not found or unreadable
    NoInput = 66,

    /// Service unavailable (69)
    /// - Feature cache unreachable
    /// - MQTT broker unreachable at startup
    Unavailable = 69,

    /// Internal software error (70)
    /// - Unexpected error
    /// - Internal consistency check failed
    Software = 70,

    /// System error (71)
    /// - OS error, system call failed
    OsError = 71,

    /// I/O error (74)
    /// - Read or write error on the cache database
    IoError = 74,

    /// Temporary failure, retry (75)
    /// - Resource temporarily unavailable
    TempFail = 75,

    /// Configuration error (78)
    /// - Required configuration value missing or inconsistent
    ConfigError = 78,
}

impl ExitCode {
    /// Returns the raw process exit code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether this code represents a successful termination.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitCode::Success => "success",
            ExitCode::Error => "error",
            ExitCode::UsageError => "usage error",
            ExitCode::DataError => "data error",
            ExitCode::NoInput => "no input",
            ExitCode::Unavailable => "service unavailable",
            ExitCode::Software => "internal software error",
            ExitCode::OsError => "os error",
            ExitCode::IoError => "io error",
            ExitCode::TempFail => "temporary failure",
            ExitCode::ConfigError => "configuration error",
        };
        write!(f, "{} ({})", name, self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values_follow_sysexits() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::UsageError.as_i32(), 64);
        assert_eq!(ExitCode::DataError.as_i32(), 65);
        assert_eq!(ExitCode::Unavailable.as_i32(), 69);
        assert_eq!(ExitCode::Software.as_i32(), 70);
        assert_eq!(ExitCode::ConfigError.as_i32(), 78);
    }

    #[test]
    fn test_default_is_success() {
        assert!(ExitCode::default().is_success());
    }

    #[test]
    fn test_display_includes_numeric_code() {
        assert_eq!(format!("{}", ExitCode::DataError), "data error (65)");
    }
}
