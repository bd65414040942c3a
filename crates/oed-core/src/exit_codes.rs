//! Exit codes for the `oed` CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.

use oed_common::Error;

/// Exit codes for `oed` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every organ and model evaluated
    Clean = 0,

    /// Report produced, but some organs or models were skipped
    Skipped = 1,

    /// Configuration error (organ table, settings)
    ConfigError = 10,

    /// Unusable input document or names
    InputError = 11,

    /// Evaluation error
    EvaluationError = 12,

    /// I/O error
    IoError = 13,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for an error that aborted the run.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidOrganTable(_) | Error::InvalidTolerance(_) => {
                ExitCode::ConfigError
            }
            Error::UnsupportedModel(_)
            | Error::UnsupportedIntegrationMethod(_)
            | Error::UnsupportedInterpolationMethod(_)
            | Error::MissingField { .. }
            | Error::ShapeMismatch { .. }
            | Error::InvalidCurve(_)
            | Error::Json(_) => ExitCode::InputError,
            Error::MissingParameter { .. }
            | Error::NonConvergence { .. }
            | Error::Numerical(_) => ExitCode::EvaluationError,
            Error::Io(_) => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // All codes fit in a byte.
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
