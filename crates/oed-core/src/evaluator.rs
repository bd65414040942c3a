//! Single OED evaluation: interpolant, response model and integrator.
//!
//! `OED = ∫₀¹ R(D(v)) dv` where `D` is the dose-of-volume interpolant of the
//! curve and `R` the response model's effect density.

use oed_common::{Error, Result};
use oed_math::{
    integrate, Integrand, IntegrationMethod, Interpolant, InterpolationMethod, QuadratureError,
    QuadratureSettings,
};
use serde::{Deserialize, Serialize};

use crate::curve::DoseVolumeCurve;
use crate::response::{ResponseModel, ResponseParams};

/// How one evaluation integrates and interpolates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOptions {
    pub integration_method: IntegrationMethod,
    pub tolerance: f64,
    pub interpolation_method: InterpolationMethod,
    pub max_refinements: usize,
    pub max_intervals: usize,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        let limits = QuadratureSettings::default();
        Self {
            integration_method: IntegrationMethod::Quadv,
            tolerance: 1e-6,
            interpolation_method: InterpolationMethod::Pchip,
            max_refinements: limits.max_refinements,
            max_intervals: limits.max_intervals,
        }
    }
}

impl IntegrationOptions {
    pub fn settings(&self) -> QuadratureSettings {
        QuadratureSettings {
            tolerance: self.tolerance,
            max_refinements: self.max_refinements,
            max_intervals: self.max_intervals,
        }
    }
}

/// Response density composed with a dose-of-volume interpolant.
pub struct ResponseIntegrand<'a> {
    interpolant: &'a Interpolant,
    params: ResponseParams,
}

impl<'a> ResponseIntegrand<'a> {
    pub fn new(interpolant: &'a Interpolant, params: ResponseParams) -> Self {
        Self {
            interpolant,
            params,
        }
    }
}

impl Integrand for ResponseIntegrand<'_> {
    fn eval(&self, v: f64) -> f64 {
        self.params.density(self.interpolant.eval(v))
    }

    fn eval_batch(&self, vs: &[f64], out: &mut Vec<f64>) {
        self.interpolant.eval_batch(vs, out);
        for d in out.iter_mut() {
            *d = self.params.density(*d);
        }
    }
}

/// Organ equivalent dose of `curve` under `params`.
pub fn evaluate_oed(
    params: &ResponseParams,
    curve: &DoseVolumeCurve,
    options: &IntegrationOptions,
) -> Result<f64> {
    let interpolant = curve.interpolant(options.interpolation_method)?;
    evaluate_with(params, &interpolant, options)
}

/// Like [`evaluate_oed`] over an interpolant the caller already built.
///
/// The interpolant's own kernel is used; `options.interpolation_method` is
/// ignored.
pub fn evaluate_with(
    params: &ResponseParams,
    interpolant: &Interpolant,
    options: &IntegrationOptions,
) -> Result<f64> {
    let integrand = ResponseIntegrand::new(interpolant, *params);
    integrate(
        &integrand,
        0.0,
        1.0,
        options.integration_method,
        &options.settings(),
    )
    .map_err(map_quadrature_error)
}

pub(crate) fn map_quadrature_error(err: QuadratureError) -> Error {
    match err {
        QuadratureError::InvalidTolerance(tol) => Error::InvalidTolerance(tol),
        QuadratureError::InvalidBounds { .. } => Error::Numerical(err.to_string()),
        QuadratureError::NonConvergence {
            method,
            iterations,
            residual,
        } => Error::NonConvergence {
            method: method.to_string(),
            iterations,
            residual,
        },
        QuadratureError::UnsupportedMethod(name) => Error::UnsupportedIntegrationMethod(name),
    }
}

/// Parse a response-model name.
pub fn parse_model(name: &str) -> Result<ResponseModel> {
    name.parse()
}

/// Parse an integration-method name into the common error type.
pub fn parse_integration_method(name: &str) -> Result<IntegrationMethod> {
    name.parse().map_err(map_quadrature_error)
}

/// Parse an interpolation-kernel name into the common error type.
pub fn parse_interpolation_method(name: &str) -> Result<InterpolationMethod> {
    name.parse::<InterpolationMethod>()
        .map_err(|_| Error::UnsupportedInterpolationMethod(name.trim().to_string()))
}
