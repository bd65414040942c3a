//! Error types for OED evaluation.

use thiserror::Error;

/// Result type alias for OED operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for OED evaluation.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid organ table: {0}")]
    InvalidOrganTable(String),

    #[error("tolerance must be finite and positive, got {0}")]
    InvalidTolerance(f64),

    // Dispatch errors (20-29)
    #[error("unsupported response model: {0}")]
    UnsupportedModel(String),

    #[error("unsupported integration method: {0}")]
    UnsupportedIntegrationMethod(String),

    #[error("unsupported interpolation method: {0}")]
    UnsupportedInterpolationMethod(String),

    #[error("organ {organ}: missing model parameter '{parameter}' for {model}")]
    MissingParameter {
        organ: String,
        model: String,
        parameter: String,
    },

    // Input data errors (30-39)
    #[error("organ {organ}: missing or empty field '{field}'")]
    MissingField { organ: String, field: String },

    #[error("organ {organ}: dose has {dose_len} samples but volume fraction has {volume_len}")]
    ShapeMismatch {
        organ: String,
        dose_len: usize,
        volume_len: usize,
    },

    #[error("invalid dose-volume curve: {0}")]
    InvalidCurve(String),

    // Numerical errors (40-49)
    #[error("{method} did not converge after {iterations} iterations (residual {residual:e})")]
    NonConvergence {
        method: String,
        iterations: usize,
        residual: f64,
    },

    #[error("numerical failure: {0}")]
    Numerical(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidOrganTable(_) => 11,
            Error::InvalidTolerance(_) => 12,
            Error::UnsupportedModel(_) => 20,
            Error::UnsupportedIntegrationMethod(_) => 21,
            Error::UnsupportedInterpolationMethod(_) => 22,
            Error::MissingParameter { .. } => 23,
            Error::MissingField { .. } => 30,
            Error::ShapeMismatch { .. } => 31,
            Error::InvalidCurve(_) => 32,
            Error::NonConvergence { .. } => 40,
            Error::Numerical(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// True for per-organ data-quality problems that the orchestrator
    /// recovers from by skipping the organ.
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            Error::MissingField { .. } | Error::ShapeMismatch { .. } | Error::InvalidCurve(_)
        )
    }
}
