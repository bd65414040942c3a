//! Small-sample statistics used to aggregate repeated evaluations.

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation with the `n - 1` denominator.
///
/// Returns NaN for an empty slice and 0 for a single value.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => 0.0,
        n => {
            let mu = mean(values);
            let ss: f64 = values.iter().map(|v| (v - mu) * (v - mu)).sum();
            (ss / (n - 1) as f64).sqrt()
        }
    }
}

/// Combine two independent error terms in quadrature: `sqrt(a^2 + b^2)`.
pub fn add_in_quadrature(a: f64, b: f64) -> f64 {
    a.hypot(b)
}
