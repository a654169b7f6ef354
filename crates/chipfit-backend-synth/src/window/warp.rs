//! Exponential incomplete-gamma amplitude warp.
//!
//! The forward curve is `f(y) = e^y * P(gamma, y)` where `P` is the
//! regularized lower incomplete gamma function. It behaves like
//! `y^gamma / Gamma(gamma + 1)` near zero and like `e^y` for large `y`, so
//! its inverse compresses loud spectral peaks logarithmically while keeping
//! quiet partials distinguishable.

use std::f64::consts::PI;

use crate::error::{SynthError, SynthResult};

/// Newton steps taken by [`general_inverse`]; there is no convergence check.
pub const NEWTON_ITERATIONS: usize = 6;

/// Gain applied to normalized magnitudes before warping.
pub const SPECTRAL_GAIN: f64 = 100.0;

const TABLE_LIMIT: f64 = 128.0;
const TABLE_SIZE: usize = 4096;

const SERIES_EPSILON: f64 = 1e-14;
const FRACTION_FLOOR: f64 = 1e-300;
const MAX_TERMS: usize = 300;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for positive arguments.
pub(crate) fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut sum = LANCZOS[0];
        for (i, coefficient) in LANCZOS.iter().enumerate().skip(1) {
            sum += coefficient / (x + i as f64);
        }
        let t = x + LANCZOS_G + 0.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
    }
}

/// Regularized lower incomplete gamma function `P(a, x)`.
pub(crate) fn lower_regularized_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let log_prefactor = -x + a * x.ln() - ln_gamma(a);

    if x < a + 1.0 {
        // Series representation
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut denominator = a;
        for _ in 0..MAX_TERMS {
            denominator += 1.0;
            term *= x / denominator;
            sum += term;
            if term.abs() < sum.abs() * SERIES_EPSILON {
                break;
            }
        }
        (sum * log_prefactor.exp()).clamp(0.0, 1.0)
    } else {
        // Continued fraction for Q(a, x), modified Lentz
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / FRACTION_FLOOR;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_TERMS {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < FRACTION_FLOOR {
                d = FRACTION_FLOOR;
            }
            c = b + an / c;
            if c.abs() < FRACTION_FLOOR {
                c = FRACTION_FLOOR;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < SERIES_EPSILON {
                break;
            }
        }
        (1.0 - log_prefactor.exp() * h).clamp(0.0, 1.0)
    }
}

/// Forward warp `e^y * P(gamma, y)`; zero for non-positive `y`.
pub fn general_interpolation(y: f64, gamma: f64) -> f64 {
    if y <= 0.0 {
        return 0.0;
    }
    y.exp() * lower_regularized_gamma(gamma, y)
}

/// Derivative of [`general_interpolation`] with respect to `y`.
pub fn general_derivative(y: f64, gamma: f64) -> f64 {
    if y <= 0.0 {
        return match gamma.partial_cmp(&1.0) {
            Some(std::cmp::Ordering::Less) => f64::INFINITY,
            Some(std::cmp::Ordering::Equal) => 1.0,
            _ => 0.0,
        };
    }
    let density = ((gamma - 1.0) * y.ln() - ln_gamma(gamma)).exp();
    y.exp() * lower_regularized_gamma(gamma, y) + density
}

/// Approximate inverse of [`general_interpolation`].
///
/// Runs exactly [`NEWTON_ITERATIONS`] Newton steps seeded at `ln(1 + x)`.
/// The result is an approximation, not an exact root.
pub fn general_inverse(x: f64, gamma: f64) -> f64 {
    if !(x > 0.0) {
        return 0.0;
    }
    let mut y = x.ln_1p();
    for _ in 0..NEWTON_ITERATIONS {
        let slope = general_derivative(y, gamma);
        if !(slope.is_finite() && slope > 0.0) {
            break;
        }
        y -= (general_interpolation(y, gamma) - x) / slope;
        if y < 0.0 {
            y = 0.0;
        }
    }
    y
}

/// Tabulated inverse warp for one gamma.
#[derive(Debug, Clone)]
pub struct Warp {
    gamma: f64,
    table: Vec<f64>,
}

impl Warp {
    /// Tabulates the inverse warp for `gamma`.
    pub fn new(gamma: f64) -> SynthResult<Self> {
        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(SynthError::invalid_param(
                "transformation_gamma",
                format!("must be positive and finite, got {}", gamma),
            ));
        }
        let step = TABLE_LIMIT / TABLE_SIZE as f64;
        let table = (0..=TABLE_SIZE)
            .map(|i| general_inverse(i as f64 * step, gamma))
            .collect();
        Ok(Self { gamma, table })
    }

    /// Shape parameter.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Warps a normalized magnitude.
    ///
    /// Values inside the table range are linearly interpolated; larger
    /// values are solved directly.
    pub fn apply(&self, magnitude: f64) -> f64 {
        let x = magnitude * SPECTRAL_GAIN;
        if !(x > 0.0) {
            return 0.0;
        }
        if x >= TABLE_LIMIT {
            return general_inverse(x, self.gamma);
        }
        let position = x / TABLE_LIMIT * TABLE_SIZE as f64;
        let index = position as usize;
        let fraction = position - index as f64;
        self.table[index] + (self.table[index + 1] - self.table[index]) * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_known_values() {
        assert!(ln_gamma(1.0).abs() < 1e-12);
        assert!(ln_gamma(2.0).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn test_incomplete_gamma_exponential_case() {
        // P(1, x) = 1 - e^-x
        for x in [0.1, 1.0, 2.5, 10.0] {
            let expected = 1.0 - (-x as f64).exp();
            assert!((lower_regularized_gamma(1.0, x) - expected).abs() < 1e-10);
        }
        assert_eq!(lower_regularized_gamma(1.5, 0.0), 0.0);
    }

    #[test]
    fn test_inverse_is_log1p_for_unit_gamma() {
        // gamma = 1 gives e^y - 1, whose inverse is the Newton seed itself
        for x in [0.01, 0.5, 3.0, 40.0] {
            assert!((general_inverse(x, 1.0) - x.ln_1p()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_inverse_residual_small() {
        for gamma in [1.0, 1.5] {
            for x in [0.001, 0.05, 0.5, 5.0, 50.0, 500.0] {
                let y = general_inverse(x, gamma);
                let residual = (general_interpolation(y, gamma) - x).abs() / x;
                assert!(residual < 1e-3, "gamma {gamma} x {x} residual {residual}");
            }
        }
    }

    #[test]
    fn test_derivative_matches_difference_quotient() {
        let gamma = 1.5;
        for y in [0.3, 1.0, 4.0] {
            let h = 1e-6;
            let numeric =
                (general_interpolation(y + h, gamma) - general_interpolation(y - h, gamma)) / (2.0 * h);
            assert!((general_derivative(y, gamma) - numeric).abs() < 1e-4 * numeric.max(1.0));
        }
    }

    #[test]
    fn test_non_positive_input_maps_to_zero() {
        assert_eq!(general_inverse(0.0, 1.5), 0.0);
        assert_eq!(general_inverse(-3.0, 1.5), 0.0);
        assert_eq!(general_inverse(f64::NAN, 1.5), 0.0);
    }

    #[test]
    fn test_warp_table_is_monotonic() {
        let warp = Warp::new(1.5).unwrap();
        let mut previous = 0.0;
        for i in 1..400 {
            let value = warp.apply(i as f64 * 0.005);
            assert!(value >= previous);
            previous = value;
        }
        // Past the table the direct solve takes over without a jump.
        let edge = TABLE_LIMIT / SPECTRAL_GAIN;
        let below = warp.apply(edge * 0.999_9);
        let above = warp.apply(edge * 1.000_1);
        assert!((above - below).abs() < 1e-2);
    }
}
