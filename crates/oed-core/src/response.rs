//! Dose-response models.
//!
//! Each model maps a physical dose `d` (Gy) to a biological-effect density.
//! The functions are pure; bad parameters yield NaN or infinity, which the
//! integrators propagate unchanged.
//!
//! | Model         | Density                                                        |
//! |---------------|----------------------------------------------------------------|
//! | `Lnt`         | `d`                                                            |
//! | `PlateauHall` | `min(d, threshold)`                                            |
//! | `LinExp`      | `d * exp(-alpha * d)`                                          |
//! | `Competition` | `(d + beta1/alpha1 * d^2/n) * exp(-(alpha2*d + beta2*d^2/n))`  |
//! | `LinPlat`     | `(1 - exp(-delta * d)) / delta`                                |

use oed_common::{Error, Result};
use oed_config::OrganParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Response model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseModel {
    Lnt,
    PlateauHall,
    LinExp,
    Competition,
    LinPlat,
}

impl ResponseModel {
    pub const ALL: [ResponseModel; 5] = [
        ResponseModel::Lnt,
        ResponseModel::PlateauHall,
        ResponseModel::LinExp,
        ResponseModel::Competition,
        ResponseModel::LinPlat,
    ];

    /// Models evaluated for every organ unless the caller asks otherwise.
    pub const DEFAULT_RUN: [ResponseModel; 4] = [
        ResponseModel::Lnt,
        ResponseModel::PlateauHall,
        ResponseModel::LinExp,
        ResponseModel::Competition,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseModel::Lnt => "lnt",
            ResponseModel::PlateauHall => "plateau_hall",
            ResponseModel::LinExp => "lin_exp",
            ResponseModel::Competition => "competition",
            ResponseModel::LinPlat => "lin_plat",
        }
    }
}

impl fmt::Display for ResponseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseModel {
    type Err = Error;

    /// Accepts the snake_case name with or without separators
    /// (`plateau_hall`, `plateau-hall`, `PlateauHall`).
    fn from_str(s: &str) -> Result<Self> {
        let squash = |v: &str| {
            v.chars()
                .filter(|c| *c != '_' && *c != '-')
                .collect::<String>()
                .to_ascii_lowercase()
        };
        let wanted = squash(s.trim());
        ResponseModel::ALL
            .into_iter()
            .find(|m| squash(m.as_str()) == wanted)
            .ok_or_else(|| Error::UnsupportedModel(s.trim().to_string()))
    }
}

/// Parameter bundle for one model; the variant selects the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ResponseParams {
    Lnt,
    PlateauHall {
        threshold: f64,
    },
    LinExp {
        alpha: f64,
    },
    Competition {
        alpha1: f64,
        beta1: f64,
        alpha2: f64,
        beta2: f64,
        num_fractions: f64,
    },
    LinPlat {
        delta: f64,
    },
}

impl ResponseParams {
    pub fn model(&self) -> ResponseModel {
        match self {
            ResponseParams::Lnt => ResponseModel::Lnt,
            ResponseParams::PlateauHall { .. } => ResponseModel::PlateauHall,
            ResponseParams::LinExp { .. } => ResponseModel::LinExp,
            ResponseParams::Competition { .. } => ResponseModel::Competition,
            ResponseParams::LinPlat { .. } => ResponseModel::LinPlat,
        }
    }

    /// Resolve the bundle for `model` from an organ's table entry.
    ///
    /// The plateau threshold falls back to its default; the linear-plateau
    /// `delta` has none and is reported as missing.
    pub fn from_organ(model: ResponseModel, organ: &str, p: &OrganParams) -> Result<Self> {
        Ok(match model {
            ResponseModel::Lnt => ResponseParams::Lnt,
            ResponseModel::PlateauHall => ResponseParams::PlateauHall {
                threshold: p.plateau_threshold(),
            },
            ResponseModel::LinExp => ResponseParams::LinExp { alpha: p.alpha },
            ResponseModel::Competition => ResponseParams::Competition {
                alpha1: p.alpha1,
                beta1: p.beta1,
                alpha2: p.alpha2,
                beta2: p.beta2,
                num_fractions: f64::from(p.num_fractions),
            },
            ResponseModel::LinPlat => {
                let delta = p.delta.ok_or_else(|| Error::MissingParameter {
                    organ: organ.to_string(),
                    model: model.to_string(),
                    parameter: "delta".to_string(),
                })?;
                ResponseParams::LinPlat { delta }
            }
        })
    }

    /// Effect density at dose `d`.
    #[inline]
    pub fn density(&self, d: f64) -> f64 {
        match *self {
            ResponseParams::Lnt => lnt(d),
            ResponseParams::PlateauHall { threshold } => plateau_hall(d, threshold),
            ResponseParams::LinExp { alpha } => lin_exp(d, alpha),
            ResponseParams::Competition {
                alpha1,
                beta1,
                alpha2,
                beta2,
                num_fractions,
            } => competition(d, alpha1, beta1, alpha2, beta2, num_fractions),
            ResponseParams::LinPlat { delta } => lin_plat(d, delta),
        }
    }
}

/// Linear no-threshold.
pub fn lnt(d: f64) -> f64 {
    d
}

/// Linear up to `threshold`, constant above it.
pub fn plateau_hall(d: f64, threshold: f64) -> f64 {
    if d < threshold {
        d
    } else {
        threshold
    }
}

/// Linear induction with exponential cell kill.
pub fn lin_exp(d: f64, alpha: f64) -> f64 {
    d * (-alpha * d).exp()
}

/// Linear-quadratic induction competing with linear-quadratic cell kill
/// over `n` fractions.
pub fn competition(d: f64, alpha1: f64, beta1: f64, alpha2: f64, beta2: f64, n: f64) -> f64 {
    let d2_per_fraction = d * d / n;
    (d + beta1 / alpha1 * d2_per_fraction) * (-(alpha2 * d + beta2 * d2_per_fraction)).exp()
}

/// Linear-plateau: saturates at `1 / delta`; `delta == 0` is the linear limit.
pub fn lin_plat(d: f64, delta: f64) -> f64 {
    if delta == 0.0 {
        return d;
    }
    -(-delta * d).exp_m1() / delta
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

    fn organ() -> OrganParams {
        OrganParams {
            threshold: None,
            alpha: 0.2,
            alpha1: 0.15,
            beta1: 0.05,
            alpha2: 0.3,
            beta2: 0.1,
            num_fractions: 30,
            delta: None,
            comment: None,
        }
    }

    #[test]
    fn all_models_vanish_at_zero_dose() {
        let mut p = organ();
        p.delta = Some(0.4);
        for model in ResponseModel::ALL {
            let params = ResponseParams::from_organ(model, "Lung", &p).unwrap();
            assert_eq!(params.density(0.0), 0.0, "{model}");
        }
    }

    #[test]
    fn plateau_caps_at_threshold() {
        let t = 4.5;
        for d in [0.0, 1.0, 4.49, 4.5, 4.51, 10.0, 70.0] {
            let v = plateau_hall(d, t);
            if d < t {
                assert_eq!(v, d);
            } else {
                assert_eq!(v, t);
            }
        }
    }

    #[test]
    fn lin_exp_matches_formula() {
        let v = lin_exp(10.0, 0.1);
        assert!(approx_eq(v, 10.0 * (-1.0_f64).exp(), 1e-12));
        // Maximum at d = 1/alpha.
        assert!(lin_exp(10.0, 0.1) > lin_exp(9.0, 0.1));
        assert!(lin_exp(10.0, 0.1) > lin_exp(11.0, 0.1));
    }

    #[test]
    fn competition_matches_formula() {
        let (a1, b1, a2, b2, n): (f64, f64, f64, f64, f64) = (0.15, 0.05, 0.3, 0.1, 30.0);
        let d: f64 = 20.0;
        let expected =
            (d + b1 / a1 * d * d / n) * (-(a2 * d + b2 * d * d / n)).exp();
        assert!(approx_eq(competition(d, a1, b1, a2, b2, n), expected, 1e-15));
    }

    #[test]
    fn lin_plat_saturates_and_has_linear_limit() {
        assert!(approx_eq(lin_plat(1000.0, 0.5), 2.0, 1e-12));
        assert_eq!(lin_plat(7.0, 0.0), 7.0);
        assert!(approx_eq(lin_plat(7.0, 1e-12), 7.0, 1e-9));
        let d = 3.0;
        let delta = 0.25;
        assert!(approx_eq(lin_plat(d, delta), (1.0 - (-delta * d).exp()) / delta, 1e-14));
    }

    #[test]
    fn bad_parameters_propagate_nan() {
        assert!(competition(2.0, 0.0, 0.0, 0.1, 0.1, 30.0).is_nan());
        assert!(lin_exp(f64::NAN, 0.1).is_nan());
    }

    #[test]
    fn plateau_threshold_defaults_to_organ_default() {
        let params =
            ResponseParams::from_organ(ResponseModel::PlateauHall, "Lung", &organ()).unwrap();
        assert_eq!(
            params,
            ResponseParams::PlateauHall {
                threshold: OrganParams::DEFAULT_THRESHOLD
            }
        );
    }

    #[test]
    fn lin_plat_requires_delta() {
        let err = ResponseParams::from_organ(ResponseModel::LinPlat, "Lung", &organ()).unwrap_err();
        match err {
            Error::MissingParameter { organ, parameter, .. } => {
                assert_eq!(organ, "Lung");
                assert_eq!(parameter, "delta");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn params_report_their_model() {
        for model in ResponseModel::DEFAULT_RUN {
            let params = ResponseParams::from_organ(model, "Lung", &organ()).unwrap();
            assert_eq!(params.model(), model);
        }
    }

    #[test]
    fn model_names_parse() {
        for model in ResponseModel::ALL {
            assert_eq!(model.as_str().parse::<ResponseModel>().unwrap(), model);
        }
        assert_eq!("PlateauHall".parse::<ResponseModel>().unwrap(), ResponseModel::PlateauHall);
        assert_eq!("lin-exp".parse::<ResponseModel>().unwrap(), ResponseModel::LinExp);
        assert!(matches!(
            "logistic".parse::<ResponseModel>(),
            Err(Error::UnsupportedModel(name)) if name == "logistic"
        ));
    }

    #[test]
    fn params_serialize_with_model_tag() {
        let json = serde_json::to_value(ResponseParams::LinExp { alpha: 0.1 }).unwrap();
        assert_eq!(json["model"], "lin_exp");
        assert_eq!(json["alpha"], 0.1);
    }
}
