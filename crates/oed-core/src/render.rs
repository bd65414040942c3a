//! Report rendering for the CLI.

use oed_common::{OutputFormat, Result};
use oed_config::OrganTable;
use serde::Serialize;
use std::fmt::Write as _;

use crate::orchestrator::OedReport;

/// Render any serializable value as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render a report in the requested format.
pub fn render_report(report: &OedReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Text => Ok(report_table(report)),
    }
}

/// Fixed-width table, one row per (organ, model).
pub fn report_table(report: &OedReport) -> String {
    let organ_width = report
        .organs
        .keys()
        .map(|k| k.chars().count())
        .chain(std::iter::once("ORGAN".len()))
        .max()
        .unwrap_or(5);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<organ_width$}  {:<12}  {:>12}  {:>12}",
        "ORGAN", "MODEL", "OED (Gy)", "± (Gy)"
    );
    for (organ, models) in &report.organs {
        for (model, result) in models {
            let _ = writeln!(
                out,
                "{:<organ_width$}  {:<12}  {:>12.4}  {:>12.4}",
                organ,
                model.as_str(),
                result.dose,
                result.dose_uncertainty
            );
        }
    }
    if report.has_skips() {
        let _ = writeln!(out, "\nskipped:");
        for entry in &report.skipped {
            match entry.model {
                Some(model) => {
                    let _ = writeln!(out, "  {} [{}]: {}", entry.organ, model, entry.reason);
                }
                None => {
                    let _ = writeln!(out, "  {}: {}", entry.organ, entry.reason);
                }
            }
        }
    }
    let _ = writeln!(
        out,
        "\n{} organ(s), method {}, tolerance {:e}",
        report.organs.len(),
        report.settings.integration_method,
        report.settings.tolerance
    );
    out
}

/// Render the organ table in the requested format.
pub fn render_organ_table(table: &OrganTable, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(table),
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(
                out,
                "{:<16}  {:>9}  {:>7}  {:>7}  {:>7}  {:>7}  {:>7}  {:>3}  {:>7}",
                "ORGAN", "THRESHOLD", "ALPHA", "ALPHA1", "BETA1", "ALPHA2", "BETA2", "N", "DELTA"
            );
            for (name, p) in &table.organs {
                let delta = p.delta.map_or_else(|| "-".to_string(), |d| format!("{d:.3}"));
                let _ = writeln!(
                    out,
                    "{:<16}  {:>9.2}  {:>7.3}  {:>7.3}  {:>7.3}  {:>7.3}  {:>7.3}  {:>3}  {:>7}",
                    name,
                    p.plateau_threshold(),
                    p.alpha,
                    p.alpha1,
                    p.beta1,
                    p.alpha2,
                    p.beta2,
                    p.num_fractions,
                    delta
                );
            }
            Ok(out)
        }
    }
}
