//! Per-organ input records.
//!
//! The engine consumes already-extracted sample arrays. On disk they are a
//! JSON document, either `{"structures": [...]}` or a bare array of records.

use oed_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raw samples for one structure, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganRecord {
    pub struct_name: String,

    #[serde(default)]
    pub dose: Option<Vec<f64>>,

    #[serde(default)]
    pub ratio_to_total_volume: Option<Vec<f64>>,

    /// Absolute volume receiving at least each dose; used when
    /// `ratio_to_total_volume` is absent.
    #[serde(default)]
    pub structure_volume: Option<Vec<f64>>,

    /// Total structure volume reported by the planning system.
    #[serde(default)]
    pub volume: Option<f64>,
}

impl OrganRecord {
    pub fn new(
        struct_name: impl Into<String>,
        dose: Vec<f64>,
        ratio_to_total_volume: Vec<f64>,
    ) -> Self {
        Self {
            struct_name: struct_name.into(),
            dose: Some(dose),
            ratio_to_total_volume: Some(ratio_to_total_volume),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputDocument {
    Wrapped { structures: Vec<OrganRecord> },
    Bare(Vec<OrganRecord>),
}

/// Parse organ records from JSON text.
pub fn parse_records(json: &str) -> Result<Vec<OrganRecord>> {
    let doc: InputDocument = serde_json::from_str(json)?;
    Ok(match doc {
        InputDocument::Wrapped { structures } => structures,
        InputDocument::Bare(records) => records,
    })
}

/// Read organ records from a JSON file.
pub fn load_records(path: &Path) -> Result<Vec<OrganRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse_records(&content)
}
