//! Property-based tests for the multi-run orchestrator.

use oed_config::OrganTable;
use oed_core::{run_report, OrganRecord, ResponseModel, RunSettings};
use proptest::prelude::*;

/// Cumulative DVH samples: non-decreasing dose, volume in whole percent
/// falling from 100 to 0.
fn dvh_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<u32>)> {
    prop::collection::vec((0.0f64..8.0, 1u32..40), 2..9).prop_map(|steps| {
        let mut dose = vec![0.0];
        let mut percent = vec![100u32];
        for (dd, dv) in steps {
            let last_dose = *dose.last().unwrap_or(&0.0);
            let last_percent = *percent.last().unwrap_or(&0);
            dose.push(last_dose + dd);
            percent.push(last_percent.saturating_sub(dv));
        }
        if let Some(last) = percent.last_mut() {
            *last = 0;
        }
        (dose, percent)
    })
}

fn record(dose: &[f64], volume: Vec<f64>) -> OrganRecord {
    OrganRecord::new("Lung", dose.to_vec(), volume)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn percent_and_fraction_inputs_agree((dose, percent) in dvh_strategy()) {
        let table = OrganTable::default();
        let settings = RunSettings::default();
        let as_percent: Vec<f64> = percent.iter().map(|&p| f64::from(p)).collect();
        let as_fraction: Vec<f64> = percent.iter().map(|&p| f64::from(p) / 100.0).collect();

        let a = run_report(&[record(&dose, as_percent)], &table, &settings).unwrap();
        let b = run_report(&[record(&dose, as_fraction)], &table, &settings).unwrap();
        prop_assert_eq!(a.organs, b.organs);
    }

    #[test]
    fn plateau_is_capped_and_below_lnt((dose, percent) in dvh_strategy()) {
        let table = OrganTable::default();
        let threshold = table.get("Lung").unwrap().plateau_threshold();
        let volume: Vec<f64> = percent.iter().map(|&p| f64::from(p)).collect();
        let report = run_report(&[record(&dose, volume)], &table, &RunSettings::default()).unwrap();

        let lnt = report.get("Lung", ResponseModel::Lnt).unwrap();
        let plateau = report.get("Lung", ResponseModel::PlateauHall).unwrap();
        prop_assert!(plateau.dose <= threshold + 1e-3, "plateau {} > {}", plateau.dose, threshold);
        prop_assert!(
            plateau.dose <= lnt.dose + 1e-2,
            "plateau {} > lnt {}",
            plateau.dose,
            lnt.dose
        );
    }

    #[test]
    fn lnt_lies_within_dose_range((dose, percent) in dvh_strategy()) {
        let table = OrganTable::default();
        let volume: Vec<f64> = percent.iter().map(|&p| f64::from(p) / 100.0).collect();
        let report = run_report(&[record(&dose, volume)], &table, &RunSettings::default()).unwrap();

        let lnt = report.get("Lung", ResponseModel::Lnt).unwrap();
        let max_dose = dose.iter().copied().fold(0.0, f64::max);
        prop_assert!(lnt.dose >= -1e-2);
        prop_assert!(lnt.dose <= max_dose + 1e-2);
        prop_assert!(lnt.dose_uncertainty >= 0.0);
    }
}
