//! Cumulative dose-volume curves.
//!
//! A curve stores paired samples `(dose[i], volume_fraction[i])` of a
//! cumulative DVH: `volume_fraction[i]` is the share of the organ receiving
//! at least `dose[i]`. Evaluation inverts the relation, so interpolants are
//! built with volume fraction as the abscissa and dose as the ordinate.

use oed_common::{Error, Result};
use oed_math::{Interpolant, InterpolationError, InterpolationMethod};

/// Validated, normalized dose-volume samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseVolumeCurve {
    dose: Vec<f64>,
    volume_fraction: Vec<f64>,
    percent_scaled: bool,
}

impl DoseVolumeCurve {
    /// Build a curve from dose and volume-fraction samples.
    ///
    /// Volume fractions whose maximum exceeds 1 are taken as percentages and
    /// divided by 100.
    pub fn new(dose: Vec<f64>, volume_fraction: Vec<f64>) -> Result<Self> {
        if dose.len() != volume_fraction.len() {
            return Err(Error::InvalidCurve(format!(
                "dose has {} samples but volume fraction has {}",
                dose.len(),
                volume_fraction.len()
            )));
        }
        if dose.len() < 2 {
            return Err(Error::InvalidCurve(format!(
                "need at least two samples, got {}",
                dose.len()
            )));
        }
        if let Some(i) = dose.iter().position(|d| !d.is_finite()) {
            return Err(Error::InvalidCurve(format!("non-finite dose at index {i}")));
        }
        if let Some(i) = volume_fraction.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidCurve(format!(
                "non-finite volume fraction at index {i}"
            )));
        }
        if let Some(i) = volume_fraction.iter().position(|v| *v < 0.0) {
            return Err(Error::InvalidCurve(format!(
                "negative volume fraction at index {i}"
            )));
        }
        if let Some(i) = dose.windows(2).position(|w| w[1] < w[0]) {
            return Err(Error::InvalidCurve(format!(
                "dose decreases at index {}",
                i + 1
            )));
        }

        let max_vf = volume_fraction.iter().copied().fold(f64::MIN, f64::max);
        let percent_scaled = max_vf > 1.0;
        let volume_fraction = if percent_scaled {
            if max_vf > 100.0 {
                return Err(Error::InvalidCurve(format!(
                    "volume fraction {max_vf} exceeds 100 percent"
                )));
            }
            volume_fraction.into_iter().map(|v| v / 100.0).collect()
        } else {
            volume_fraction
        };

        let curve = Self {
            dose,
            volume_fraction,
            percent_scaled,
        };
        if curve.knots().0.len() < 2 {
            return Err(Error::InvalidCurve(
                "need at least two distinct volume fractions".to_string(),
            ));
        }
        Ok(curve)
    }

    /// Build a curve from absolute structure volumes, normalizing by the
    /// first sample (the volume receiving at least the lowest dose).
    pub fn from_structure_volume(dose: Vec<f64>, structure_volume: &[f64]) -> Result<Self> {
        let Some(&total) = structure_volume.first() else {
            return Err(Error::InvalidCurve("structure volume is empty".to_string()));
        };
        if !(total.is_finite() && total > 0.0) {
            return Err(Error::InvalidCurve(format!(
                "first structure volume must be positive, got {total}"
            )));
        }
        let volume_fraction: Vec<f64> = structure_volume.iter().map(|v| v / total).collect();
        if let Some(i) = volume_fraction.iter().position(|v| *v > 1.0) {
            return Err(Error::InvalidCurve(format!(
                "structure volume at index {i} exceeds the first sample"
            )));
        }
        Self::new(dose, volume_fraction)
    }

    pub fn len(&self) -> usize {
        self.dose.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dose.is_empty()
    }

    pub fn dose(&self) -> &[f64] {
        &self.dose
    }

    /// Volume fractions in `[0, 1]`.
    pub fn volume_fraction(&self) -> &[f64] {
        &self.volume_fraction
    }

    /// True when the input was given in percent.
    pub fn was_percent_scaled(&self) -> bool {
        self.percent_scaled
    }

    /// Interpolation knots: strictly increasing volume fractions and the
    /// matching doses.
    ///
    /// Samples sharing a volume fraction collapse to one knot. A non-zero
    /// fraction keeps its largest dose; the zero-volume tail keeps its
    /// smallest.
    pub fn knots(&self) -> (Vec<f64>, Vec<f64>) {
        let mut pairs: Vec<(f64, f64)> = self
            .volume_fraction
            .iter()
            .copied()
            .zip(self.dose.iter().copied())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut xs: Vec<f64> = Vec::with_capacity(pairs.len());
        let mut ys: Vec<f64> = Vec::with_capacity(pairs.len());
        for (v, d) in pairs {
            match xs.last() {
                Some(&last) if last == v => {
                    let y = ys.len() - 1;
                    ys[y] = if v == 0.0 { ys[y].min(d) } else { ys[y].max(d) };
                }
                _ => {
                    xs.push(v);
                    ys.push(d);
                }
            }
        }
        (xs, ys)
    }

    /// Dose as a function of volume fraction.
    pub fn interpolant(&self, method: InterpolationMethod) -> Result<Interpolant> {
        let (xs, ys) = self.knots();
        Interpolant::new(xs, ys, method).map_err(|e| match e {
            InterpolationError::UnsupportedMethod(name) => {
                Error::UnsupportedInterpolationMethod(name)
            }
            other => Error::InvalidCurve(other.to_string()),
        })
    }
}
