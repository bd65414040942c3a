//! Organ equivalent dose (OED) evaluation engine.
//!
//! A cumulative dose-volume histogram is turned into a dose-of-volume
//! interpolant, weighted by a dose-response model, and integrated over the
//! unit volume interval. The orchestrator repeats this under several
//! interpolation/tolerance configurations to attach a numerical uncertainty.

pub mod curve;
pub mod evaluator;
pub mod exit_codes;
pub mod input;
pub mod orchestrator;
pub mod render;
pub mod response;

pub use curve::DoseVolumeCurve;
pub use evaluator::{evaluate_oed, evaluate_with, IntegrationOptions, ResponseIntegrand};
pub use input::OrganRecord;
pub use orchestrator::{run_report, ModelResult, OedReport, OrganResult, RunSettings, SkippedEntry};
pub use response::{ResponseModel, ResponseParams};
