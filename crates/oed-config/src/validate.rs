//! Semantic validation for the organ parameter table.

use thiserror::Error;

use crate::organs::{OrganParams, OrganTable};
use crate::CONFIG_SCHEMA_VERSION;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("unsupported schema version {found} (expected major of {expected})")]
    SchemaVersion { found: String, expected: String },

    #[error("organ table has no entries")]
    EmptyTable,

    #[error("organ table contains a blank organ name")]
    BlankOrganName,

    #[error("organ {organ}: {field} {reason} (got {value})")]
    InvalidValue {
        organ: String,
        field: &'static str,
        reason: &'static str,
        value: f64,
    },
}

/// Result of validating a configuration document.
pub type ValidationResult = Result<(), ValidationError>;

impl From<ValidationError> for oed_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IoError(msg) => oed_common::Error::Config(msg),
            other => oed_common::Error::InvalidOrganTable(other.to_string()),
        }
    }
}

/// Check every organ entry for values the response models cannot use.
pub fn validate_organ_table(table: &OrganTable) -> ValidationResult {
    let major = |v: &str| v.split('.').next().and_then(|s| s.parse::<u32>().ok());
    if major(&table.schema_version).is_none()
        || major(&table.schema_version) != major(CONFIG_SCHEMA_VERSION)
    {
        return Err(ValidationError::SchemaVersion {
            found: table.schema_version.clone(),
            expected: CONFIG_SCHEMA_VERSION.to_string(),
        });
    }
    if table.organs.is_empty() {
        return Err(ValidationError::EmptyTable);
    }
    for (name, params) in &table.organs {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankOrganName);
        }
        validate_params(name, params)?;
    }
    Ok(())
}

fn validate_params(organ: &str, p: &OrganParams) -> ValidationResult {
    let invalid = |field: &'static str, reason: &'static str, value: f64| {
        Err(ValidationError::InvalidValue {
            organ: organ.to_string(),
            field,
            reason,
            value,
        })
    };

    let non_negative = [
        ("alpha", p.alpha),
        ("beta1", p.beta1),
        ("alpha2", p.alpha2),
        ("beta2", p.beta2),
    ];
    for (field, value) in non_negative {
        if !value.is_finite() {
            return invalid(field, "must be finite", value);
        }
        if value < 0.0 {
            return invalid(field, "must be non-negative", value);
        }
    }
    if !(p.alpha1.is_finite() && p.alpha1 > 0.0) {
        return invalid("alpha1", "must be finite and positive", p.alpha1);
    }
    if p.num_fractions == 0 {
        return invalid("num_fractions", "must be at least 1", 0.0);
    }
    if let Some(threshold) = p.threshold {
        if !(threshold.is_finite() && threshold > 0.0) {
            return invalid("threshold", "must be finite and positive", threshold);
        }
    }
    if let Some(delta) = p.delta {
        if !(delta.is_finite() && delta >= 0.0) {
            return invalid("delta", "must be finite and non-negative", delta);
        }
    }
    Ok(())
}
