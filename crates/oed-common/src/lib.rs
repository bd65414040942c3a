//! OED common types and errors.
//!
//! This crate provides foundational types shared across the OED crates:
//! - The unified error taxonomy with stable error codes
//! - Report schema versioning
//! - Output format selection

pub mod error;
pub mod output;
pub mod schema;

pub use error::{Error, Result};
pub use output::OutputFormat;
pub use schema::SCHEMA_VERSION;
