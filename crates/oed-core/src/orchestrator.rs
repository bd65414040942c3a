//! Multi-run OED orchestration.
//!
//! Every (organ, model) pair is evaluated under four configurations:
//!
//! | # | Kernel | Tolerance |
//! |---|--------|-----------|
//! | 1 | pchip  | `tol`     |
//! | 2 | linear | `tol`     |
//! | 3 | pchip  | `10·tol`  |
//! | 4 | linear | `10·tol`  |
//!
//! The first configuration is the point estimate; the sample standard
//! deviation of all four is the numerical uncertainty. Per-organ data
//! problems skip that organ (or model) and are recorded in the report.

use oed_common::{Error, Result, SCHEMA_VERSION};
use oed_config::OrganTable;
use oed_math::{
    add_in_quadrature, sample_std_dev, IntegrationMethod, InterpolationMethod, QuadratureSettings,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::curve::DoseVolumeCurve;
use crate::evaluator::{evaluate_with, IntegrationOptions};
use crate::input::OrganRecord;
use crate::response::{ResponseModel, ResponseParams};

/// Run-level settings shared by every organ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Base tolerance; the coarse configurations use ten times this.
    pub tolerance: f64,
    pub integration_method: IntegrationMethod,
    pub models: Vec<ResponseModel>,
    pub max_refinements: usize,
    pub max_intervals: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        let limits = QuadratureSettings::default();
        Self {
            tolerance: 1e-3,
            integration_method: IntegrationMethod::Quadv,
            models: ResponseModel::DEFAULT_RUN.to_vec(),
            max_refinements: limits.max_refinements,
            max_intervals: limits.max_intervals,
        }
    }
}

impl RunSettings {
    /// The four evaluation configurations, point estimate first.
    pub fn configurations(&self) -> [IntegrationOptions; 4] {
        let config = |interpolation_method, tolerance| IntegrationOptions {
            integration_method: self.integration_method,
            tolerance,
            interpolation_method,
            max_refinements: self.max_refinements,
            max_intervals: self.max_intervals,
        };
        let coarse = self.tolerance * 10.0;
        [
            config(InterpolationMethod::Pchip, self.tolerance),
            config(InterpolationMethod::Linear, self.tolerance),
            config(InterpolationMethod::Pchip, coarse),
            config(InterpolationMethod::Linear, coarse),
        ]
    }
}

/// Point estimate and numerical uncertainty for one (organ, model).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub dose: f64,
    pub dose_uncertainty: f64,
}

/// Results for one organ, keyed by model.
pub type OrganResult = BTreeMap<ResponseModel, ModelResult>;

/// An organ, or one model of an organ, left out of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub organ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ResponseModel>,
    pub reason: String,
    pub code: u32,
}

/// Complete result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OedReport {
    pub schema_version: String,
    pub settings: RunSettings,
    pub organs: BTreeMap<String, OrganResult>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
}

impl OedReport {
    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn get(&self, organ: &str, model: ResponseModel) -> Option<&ModelResult> {
        self.organs.get(organ)?.get(&model)
    }
}

/// Combine the four configuration results.
///
/// `relative_error` is the relative error of reconstructed volume data; when
/// present it is added to the uncertainty in quadrature as `dose * error`.
pub fn aggregate(doses: &[f64], relative_error: Option<f64>) -> ModelResult {
    let dose = doses.first().copied().unwrap_or(f64::NAN);
    let spread = sample_std_dev(doses);
    let dose_uncertainty = match relative_error {
        Some(rel) => add_in_quadrature(spread, dose * rel),
        None => spread,
    };
    ModelResult {
        dose,
        dose_uncertainty,
    }
}

/// A validated curve plus the relative error of reconstructed fractions.
struct PreparedCurve {
    curve: DoseVolumeCurve,
    reconstruction_error: Option<f64>,
}

fn prepare_curve(record: &OrganRecord) -> Result<PreparedCurve> {
    let organ = &record.struct_name;
    let dose = match &record.dose {
        Some(d) if !d.is_empty() => d.clone(),
        _ => {
            return Err(Error::MissingField {
                organ: organ.clone(),
                field: "dose".to_string(),
            })
        }
    };

    if let Some(vf) = record.ratio_to_total_volume.as_ref().filter(|v| !v.is_empty()) {
        if vf.len() != dose.len() {
            return Err(Error::ShapeMismatch {
                organ: organ.clone(),
                dose_len: dose.len(),
                volume_len: vf.len(),
            });
        }
        return Ok(PreparedCurve {
            curve: DoseVolumeCurve::new(dose, vf.clone())?,
            reconstruction_error: None,
        });
    }

    if let Some(sv) = record.structure_volume.as_ref().filter(|v| !v.is_empty()) {
        if sv.len() != dose.len() {
            return Err(Error::ShapeMismatch {
                organ: organ.clone(),
                dose_len: dose.len(),
                volume_len: sv.len(),
            });
        }
        let curve = DoseVolumeCurve::from_structure_volume(dose, sv)?;
        let error = match record.volume.filter(|v| v.is_finite() && *v > 0.0) {
            Some(total) => (sv[0] - total).abs() / total,
            None => {
                debug!(organ = %organ, "no total volume given, uncertainty not inflated");
                0.0
            }
        };
        debug!(organ = %organ, relative_error = error, "volume fractions reconstructed");
        return Ok(PreparedCurve {
            curve,
            reconstruction_error: Some(error),
        });
    }

    Err(Error::MissingField {
        organ: organ.clone(),
        field: "ratioToTotalVolume".to_string(),
    })
}

/// Evaluate every configured model for every known organ.
///
/// Only an invalid run tolerance is fatal; everything organ-specific is
/// recorded in [`OedReport::skipped`].
pub fn run_report(
    records: &[OrganRecord],
    table: &OrganTable,
    settings: &RunSettings,
) -> Result<OedReport> {
    if !(settings.tolerance.is_finite() && settings.tolerance > 0.0) {
        return Err(Error::InvalidTolerance(settings.tolerance));
    }
    let configurations = settings.configurations();
    let mut organs: BTreeMap<String, OrganResult> = BTreeMap::new();
    let mut skipped = Vec::new();

    for record in records {
        let name = record.struct_name.as_str();
        let Some(organ_params) = table.get(name) else {
            debug!(organ = %name, "no parameters for organ, ignoring");
            continue;
        };
        // A repeated organ replaces everything recorded for its earlier entry.
        let had_skips = skipped.len();
        skipped.retain(|e: &SkippedEntry| e.organ != name);
        if organs.remove(name).is_some() || skipped.len() != had_skips {
            warn!(organ = %name, "duplicate organ in input, keeping the last");
        }

        let prepared = match prepare_curve(record) {
            Ok(p) => p,
            Err(err) => {
                skip(&mut skipped, name, None, &err);
                continue;
            }
        };
        let interpolants = match (
            prepared.curve.interpolant(InterpolationMethod::Pchip),
            prepared.curve.interpolant(InterpolationMethod::Linear),
        ) {
            (Ok(pchip), Ok(linear)) => [pchip, linear],
            (Err(err), _) | (_, Err(err)) => {
                skip(&mut skipped, name, None, &err);
                continue;
            }
        };

        let mut organ_result = OrganResult::new();
        for &model in &settings.models {
            let outcome = ResponseParams::from_organ(model, name, organ_params).and_then(|params| {
                configurations
                    .iter()
                    .map(|options| {
                        let interpolant = match options.interpolation_method {
                            InterpolationMethod::Pchip => &interpolants[0],
                            InterpolationMethod::Linear => &interpolants[1],
                        };
                        evaluate_with(&params, interpolant, options)
                    })
                    .collect::<Result<Vec<f64>>>()
            });
            match outcome {
                Ok(doses) => {
                    let result = aggregate(&doses, prepared.reconstruction_error);
                    debug!(
                        organ = %name,
                        model = %model,
                        dose = result.dose,
                        uncertainty = result.dose_uncertainty,
                        "model evaluated"
                    );
                    organ_result.insert(model, result);
                }
                Err(err) => skip(&mut skipped, name, Some(model), &err),
            }
        }

        if !organ_result.is_empty() {
            organs.insert(name.to_string(), organ_result);
        }
    }

    info!(
        organs = organs.len(),
        skipped = skipped.len(),
        method = %settings.integration_method,
        tolerance = settings.tolerance,
        "OED run complete"
    );

    Ok(OedReport {
        schema_version: SCHEMA_VERSION.to_string(),
        settings: settings.clone(),
        organs,
        skipped,
    })
}

fn skip(skipped: &mut Vec<SkippedEntry>, organ: &str, model: Option<ResponseModel>, err: &Error) {
    let kind = if err.is_data_quality() { "data" } else { "evaluation" };
    match model {
        Some(m) => warn!(
            organ = %organ,
            model = %m,
            kind,
            code = err.code(),
            reason = %err,
            "skipping model"
        ),
        None => warn!(
            organ = %organ,
            kind,
            code = err.code(),
            reason = %err,
            "skipping organ"
        ),
    }
    skipped.push(SkippedEntry {
        organ: organ.to_string(),
        model,
        reason: err.to_string(),
        code: err.code(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    fn table() -> OrganTable {
        OrganTable::parse_json(
            r#"{
                "schema_version": "1.0.0",
                "organs": {
                    "Lung": {
                        "threshold": 5.0,
                        "alpha": 0.129, "alpha1": 0.129, "beta1": 0.043,
                        "alpha2": 0.129, "beta2": 0.043, "num_fractions": 30
                    },
                    "Liver": {
                        "alpha": 0.487, "alpha1": 0.487, "beta1": 0.162,
                        "alpha2": 0.487, "beta2": 0.162, "num_fractions": 30,
                        "delta": 0.373
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn dvh(name: &str) -> OrganRecord {
        OrganRecord::new(
            name,
            vec![0.0, 5.0, 10.0, 20.0, 30.0],
            vec![1.0, 0.8, 0.5, 0.2, 0.0],
        )
    }

    #[test]
    fn configurations_follow_fixed_order() {
        let settings = RunSettings {
            tolerance: 1e-4,
            ..RunSettings::default()
        };
        let c = settings.configurations();
        assert_eq!(c[0].interpolation_method, InterpolationMethod::Pchip);
        assert_eq!(c[1].interpolation_method, InterpolationMethod::Linear);
        assert_eq!(c[2].interpolation_method, InterpolationMethod::Pchip);
        assert_eq!(c[3].interpolation_method, InterpolationMethod::Linear);
        assert_eq!(c[0].tolerance, 1e-4);
        assert_eq!(c[1].tolerance, 1e-4);
        assert!(approx_eq(c[2].tolerance, 1e-3, 1e-18));
        assert!(approx_eq(c[3].tolerance, 1e-3, 1e-18));
        assert!(c.iter().all(|o| o.integration_method == IntegrationMethod::Quadv));
    }

    #[test]
    fn aggregate_takes_first_and_sample_std() {
        let result = aggregate(&[10.0, 10.2, 9.9, 10.1], None);
        assert_eq!(result.dose, 10.0);
        assert!(approx_eq(result.dose_uncertainty, (0.05_f64 / 3.0).sqrt(), 1e-12));
    }

    #[test]
    fn aggregate_inflates_in_quadrature() {
        let doses = [10.0, 10.2, 9.9, 10.1];
        let plain = aggregate(&doses, None);
        let inflated = aggregate(&doses, Some(0.05));
        let expected = plain.dose_uncertainty.hypot(10.0 * 0.05);
        assert!(approx_eq(inflated.dose_uncertainty, expected, 1e-12));
        assert_eq!(aggregate(&doses, Some(0.0)), plain);
    }

    #[test]
    fn default_models_run_for_known_organs() {
        let report = run_report(&[dvh("Lung")], &table(), &RunSettings::default()).unwrap();
        assert_eq!(report.schema_version, SCHEMA_VERSION);
        let lung = &report.organs["Lung"];
        assert_eq!(
            lung.keys().copied().collect::<Vec<_>>(),
            ResponseModel::DEFAULT_RUN.to_vec()
        );
        for result in lung.values() {
            assert!(result.dose.is_finite());
            assert!(result.dose_uncertainty >= 0.0);
        }
        let plateau = report.get("Lung", ResponseModel::PlateauHall).unwrap();
        assert!(plateau.dose <= 5.0 + 1e-9);
        assert!(!report.has_skips());
    }

    #[test]
    fn point_estimate_is_pchip_at_base_tolerance() {
        let settings = RunSettings::default();
        let report = run_report(&[dvh("Lung")], &table(), &settings).unwrap();
        let curve = DoseVolumeCurve::new(
            vec![0.0, 5.0, 10.0, 20.0, 30.0],
            vec![1.0, 0.8, 0.5, 0.2, 0.0],
        )
        .unwrap();
        let direct = crate::evaluator::evaluate_oed(
            &ResponseParams::Lnt,
            &curve,
            &settings.configurations()[0],
        )
        .unwrap();
        assert_eq!(report.get("Lung", ResponseModel::Lnt).unwrap().dose, direct);
    }

    #[test]
    fn unknown_organs_are_ignored_silently() {
        let records = [dvh("Spleen"), dvh("Lung")];
        let report = run_report(&records, &table(), &RunSettings::default()).unwrap();
        assert!(!report.organs.contains_key("Spleen"));
        assert!(report.organs.contains_key("Lung"));
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn empty_dose_skips_only_that_organ() {
        let mut bad = dvh("Liver");
        bad.dose = Some(Vec::new());
        let report = run_report(&[bad, dvh("Lung")], &table(), &RunSettings::default()).unwrap();
        assert!(report.organs.contains_key("Lung"));
        assert!(!report.organs.contains_key("Liver"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].organ, "Liver");
        assert_eq!(report.skipped[0].code, 30);
    }

    #[test]
    fn shape_mismatch_is_skipped() {
        let mut bad = dvh("Lung");
        bad.ratio_to_total_volume = Some(vec![1.0, 0.5]);
        let report = run_report(&[bad], &table(), &RunSettings::default()).unwrap();
        assert!(report.organs.is_empty());
        assert_eq!(report.skipped[0].code, 31);
    }

    #[test]
    fn missing_volume_without_fallback_is_skipped() {
        let mut bad = dvh("Lung");
        bad.ratio_to_total_volume = None;
        let report = run_report(&[bad], &table(), &RunSettings::default()).unwrap();
        assert!(report.organs.is_empty());
        assert!(report.skipped[0].reason.contains("ratioToTotalVolume"));
    }

    #[test]
    fn structure_volume_fallback_inflates_uncertainty() {
        let mut record = dvh("Lung");
        record.ratio_to_total_volume = None;
        record.structure_volume = Some(vec![200.0, 160.0, 100.0, 40.0, 0.0]);
        record.volume = Some(190.0);

        let reconstructed =
            run_report(&[record.clone()], &table(), &RunSettings::default()).unwrap();
        let direct = run_report(&[dvh("Lung")], &table(), &RunSettings::default()).unwrap();

        let rel = 10.0 / 190.0;
        for model in ResponseModel::DEFAULT_RUN {
            let r = reconstructed.get("Lung", model).unwrap();
            let d = direct.get("Lung", model).unwrap();
            assert!(approx_eq(r.dose, d.dose, 1e-12), "{model}");
            let expected = d.dose_uncertainty.hypot(d.dose * rel);
            assert!(approx_eq(r.dose_uncertainty, expected, 1e-12), "{model}");
        }

        record.volume = None;
        let no_total = run_report(&[record], &table(), &RunSettings::default()).unwrap();
        assert_eq!(no_total.organs, direct.organs);
    }

    #[test]
    fn lin_plat_needs_delta() {
        let settings = RunSettings {
            models: vec![ResponseModel::Lnt, ResponseModel::LinPlat],
            ..RunSettings::default()
        };
        let report = run_report(&[dvh("Lung"), dvh("Liver")], &table(), &settings).unwrap();
        assert!(report.get("Liver", ResponseModel::LinPlat).is_some());
        assert!(report.get("Lung", ResponseModel::LinPlat).is_none());
        assert!(report.get("Lung", ResponseModel::Lnt).is_some());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].model, Some(ResponseModel::LinPlat));
        assert_eq!(report.skipped[0].code, 23);
    }

    #[test]
    fn non_convergence_skips_the_model() {
        let settings = RunSettings {
            tolerance: 1e-4,
            integration_method: IntegrationMethod::TrapzAdaptive,
            models: vec![ResponseModel::Lnt],
            max_refinements: 1,
            ..RunSettings::default()
        };
        let record = OrganRecord::new(
            "Lung",
            vec![0.0, 0.0, 1e6, 1e6],
            vec![1.0, 0.70710679, 0.70710678, 0.0],
        );
        let report = run_report(&[record], &table(), &settings).unwrap();
        assert!(report.organs.is_empty());
        assert_eq!(report.skipped[0].code, 40);
    }

    #[test]
    fn failing_duplicate_replaces_earlier_result() {
        let mut bad = dvh("Lung");
        bad.dose = Some(Vec::new());
        let report = run_report(&[dvh("Lung"), bad], &table(), &RunSettings::default()).unwrap();
        assert!(!report.organs.contains_key("Lung"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].organ, "Lung");
        assert_eq!(report.skipped[0].code, 30);
    }

    #[test]
    fn valid_duplicate_clears_earlier_skip() {
        let mut bad = dvh("Lung");
        bad.dose = Some(Vec::new());
        let report = run_report(&[bad, dvh("Lung")], &table(), &RunSettings::default()).unwrap();
        assert!(report.organs.contains_key("Lung"));
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn last_duplicate_wins() {
        let shifted = OrganRecord::new(
            "Lung",
            vec![10.0, 15.0, 20.0, 30.0, 40.0],
            vec![1.0, 0.8, 0.5, 0.2, 0.0],
        );
        let settings = RunSettings::default();
        let both = run_report(&[dvh("Lung"), shifted.clone()], &table(), &settings).unwrap();
        let last = run_report(&[shifted], &table(), &settings).unwrap();
        assert_eq!(both.organs, last.organs);
    }

    #[test]
    fn invalid_tolerance_is_fatal() {
        let settings = RunSettings {
            tolerance: -1.0,
            ..RunSettings::default()
        };
        assert!(matches!(
            run_report(&[dvh("Lung")], &table(), &settings),
            Err(Error::InvalidTolerance(_))
        ));
    }

    #[test]
    fn report_serializes_with_snake_case_models() {
        let report = run_report(&[dvh("Lung")], &table(), &RunSettings::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["organs"]["Lung"]["plateau_hall"]["dose"].is_number());
        assert!(json["organs"]["Lung"]["lnt"]["dose_uncertainty"].is_number());
        assert_eq!(json["settings"]["integration_method"], "quadv");
        assert_eq!(json["skipped"], serde_json::json!([]));
        assert!(oed_common::schema::is_compatible(
            json["schema_version"].as_str().unwrap()
        ));
    }
}
