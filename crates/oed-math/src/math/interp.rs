//! One-dimensional interpolation over strictly increasing knots.
//!
//! Two kernels are provided:
//! - `Pchip`: piecewise cubic Hermite with Fritsch–Carlson slope limiting.
//!   The interpolant never overshoots the data between knots and preserves
//!   monotonicity of the samples.
//! - `Linear`: piecewise linear.
//!
//! Arguments outside `[xs[0], xs[n-1]]` are clamped to the nearest end knot.
//! NaN arguments evaluate to NaN.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Interpolation kernel selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    #[default]
    Pchip,
    Linear,
}

impl InterpolationMethod {
    pub const ALL: [InterpolationMethod; 2] =
        [InterpolationMethod::Pchip, InterpolationMethod::Linear];

    pub fn as_str(self) -> &'static str {
        match self {
            InterpolationMethod::Pchip => "pchip",
            InterpolationMethod::Linear => "linear",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationMethod {
    type Err = InterpolationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pchip" => Ok(InterpolationMethod::Pchip),
            "linear" => Ok(InterpolationMethod::Linear),
            other => Err(InterpolationError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Errors raised while building an interpolant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("need at least two knots, got {0}")]
    TooFewKnots(usize),

    #[error("knot abscissae and ordinates differ in length ({xs} vs {ys})")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("knot abscissae must be strictly increasing (violated at index {0})")]
    NotIncreasing(usize),

    #[error("non-finite knot value at index {0}")]
    NonFinite(usize),

    #[error("unsupported interpolation method: {0}")]
    UnsupportedMethod(String),
}

/// A continuous function built from discrete knots.
#[derive(Debug, Clone)]
pub struct Interpolant {
    method: InterpolationMethod,
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Hermite derivatives at the knots; empty for the linear kernel.
    slopes: Vec<f64>,
}

impl Interpolant {
    /// Build an interpolant over `(xs, ys)` with the given kernel.
    pub fn new(
        xs: Vec<f64>,
        ys: Vec<f64>,
        method: InterpolationMethod,
    ) -> Result<Self, InterpolationError> {
        validate_knots(&xs, &ys)?;
        let slopes = match method {
            InterpolationMethod::Pchip => pchip_slopes(&xs, &ys),
            InterpolationMethod::Linear => Vec::new(),
        };
        Ok(Self {
            method,
            xs,
            ys,
            slopes,
        })
    }

    pub fn pchip(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpolationError> {
        Self::new(xs, ys, InterpolationMethod::Pchip)
    }

    pub fn linear(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpolationError> {
        Self::new(xs, ys, InterpolationMethod::Linear)
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Closed interval covered by the knots.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn knots(&self) -> (&[f64], &[f64]) {
        (&self.xs, &self.ys)
    }

    /// Evaluate at a single point.
    pub fn eval(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        // First knot strictly greater than x, minus one; always in [0, n-2] here.
        let k = self.xs.partition_point(|&v| v <= x) - 1;
        let h = self.xs[k + 1] - self.xs[k];
        let t = x - self.xs[k];
        let delta = (self.ys[k + 1] - self.ys[k]) / h;
        match self.method {
            InterpolationMethod::Linear => self.ys[k] + t * delta,
            InterpolationMethod::Pchip => {
                let d0 = self.slopes[k];
                let d1 = self.slopes[k + 1];
                let c2 = (3.0 * delta - 2.0 * d0 - d1) / h;
                let c3 = (d0 - 2.0 * delta + d1) / (h * h);
                self.ys[k] + t * (d0 + t * (c2 + t * c3))
            }
        }
    }

    /// Evaluate at every point of `xs`, replacing the contents of `out`.
    pub fn eval_batch(&self, xs: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.reserve(xs.len());
        out.extend(xs.iter().map(|&x| self.eval(x)));
    }
}

fn validate_knots(xs: &[f64], ys: &[f64]) -> Result<(), InterpolationError> {
    if xs.len() != ys.len() {
        return Err(InterpolationError::LengthMismatch {
            xs: xs.len(),
            ys: ys.len(),
        });
    }
    if xs.len() < 2 {
        return Err(InterpolationError::TooFewKnots(xs.len()));
    }
    for (i, (x, y)) in xs.iter().zip(ys.iter()).enumerate() {
        if !x.is_finite() || !y.is_finite() {
            return Err(InterpolationError::NonFinite(i));
        }
    }
    for i in 1..xs.len() {
        if xs[i] <= xs[i - 1] {
            return Err(InterpolationError::NotIncreasing(i));
        }
    }
    Ok(())
}

/// Sign with an exact zero, unlike `f64::signum`.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Shape-preserving derivatives at every knot.
fn pchip_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let del: Vec<f64> = (0..n - 1).map(|k| (ys[k + 1] - ys[k]) / h[k]).collect();

    if n == 2 {
        return vec![del[0], del[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if sign(del[k - 1]) * sign(del[k]) > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / del[k - 1] + w2 / del[k]);
        }
    }
    d[0] = end_slope(h[0], h[1], del[0], del[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], del[n - 2], del[n - 3]);
    d
}

/// One-sided three-point end derivative, limited to keep the end interval
/// shape-preserving.
fn end_slope(h0: f64, h1: f64, del0: f64, del1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * del0 - h0 * del1) / (h0 + h1);
    if sign(d) != sign(del0) {
        0.0
    } else if sign(del0) != sign(del1) && d.abs() > (3.0 * del0).abs() {
        3.0 * del0
    } else {
        d
    }
}
