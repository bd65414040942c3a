//! Per-organ dose-response parameter table.
//!
//! The table maps an organ (structure) name to the constants of every
//! response model. Names are matched exactly; no normalization is applied.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::validate::ValidationError;

/// Complete organ parameter table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrganTable {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    pub organs: BTreeMap<String, OrganParams>,
}

/// Response-model constants for one organ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrganParams {
    /// Plateau dose for the plateau model (Gy). Falls back to
    /// [`OrganParams::DEFAULT_THRESHOLD`] when absent.
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Cell-kill coefficient of the linear-exponential model (1/Gy).
    pub alpha: f64,

    /// Linear induction coefficient of the competition model (1/Gy).
    pub alpha1: f64,

    /// Quadratic induction coefficient of the competition model (1/Gy^2).
    pub beta1: f64,

    /// Linear cell-kill coefficient of the competition model (1/Gy).
    pub alpha2: f64,

    /// Quadratic cell-kill coefficient of the competition model (1/Gy^2).
    pub beta2: f64,

    /// Number of treatment fractions used by the competition model.
    pub num_fractions: u32,

    /// Repopulation parameter of the linear-plateau model (1/Gy).
    #[serde(default)]
    pub delta: Option<f64>,

    #[serde(rename = "_comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl OrganParams {
    /// Plateau threshold applied when the table leaves it unset (Gy).
    pub const DEFAULT_THRESHOLD: f64 = 4.5;

    /// Threshold for the plateau model, with the default applied.
    pub fn plateau_threshold(&self) -> f64 {
        self.threshold.unwrap_or(Self::DEFAULT_THRESHOLD)
    }
}

impl OrganTable {
    /// Load an organ table from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_json(&content)
    }

    /// Parse an organ table from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Parameters for an organ, if the table knows it.
    pub fn get(&self, organ: &str) -> Option<&OrganParams> {
        self.organs.get(organ)
    }

    pub fn contains(&self, organ: &str) -> bool {
        self.organs.contains_key(organ)
    }

    pub fn len(&self) -> usize {
        self.organs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organs.is_empty()
    }

    /// Organ names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.organs.keys().map(String::as_str)
    }
}

/// Embedded default organ table for fallback.
const DEFAULT_ORGANS_JSON: &str = include_str!("schemas/organs.default.json");

impl Default for OrganTable {
    fn default() -> Self {
        // The JSON is embedded at compile time and covered by tests.
        Self::parse_json(DEFAULT_ORGANS_JSON).expect("Embedded default organ table JSON is invalid")
    }
}
