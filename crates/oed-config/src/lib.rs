//! OED configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the per-organ model parameter table
//! - Table resolution (CLI → env → XDG → embedded default)
//! - Semantic validation of parameter values

pub mod organs;
pub mod resolve;
pub mod validate;

pub use organs::{OrganParams, OrganTable};
pub use resolve::{resolve_config, ConfigPaths, ResolvedConfig, TableSource};
pub use validate::{validate_organ_table, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
