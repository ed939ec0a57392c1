//! Inverse-CDF mappings from the unit interval onto a parameter range
//!
//! Every mapping here sends `[0, 1)` into `[min, max)`. Stratification
//! happens in the unit hypercube, so adding a distribution never touches the
//! sampler itself.

use serde::{Deserialize, Serialize};

/// Maps a unit-interval sample onto a parameter's range.
pub trait Distribution: Send + Sync {
    /// Map `unit` in `[0, 1)` to a value in `[min, max)`.
    ///
    /// Must be monotonically non-decreasing in `unit`.
    fn inverse_cdf(&self, unit: f64) -> f64;
}

/// Smallest normal probability mass a `[min, max)` range may hold. Below it
/// the CDF bounds saturate and every stratum maps to the same value.
const MIN_NORMAL_MASS: f64 = 1e-9;

/// Declared distribution of a parameter, as written in the parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DistributionKind {
    /// Uniform over `[min, max)`
    #[default]
    Uniform,
    /// Normal with the given moments, truncated to `[min, max)`
    Normal {
        /// Mean of the untruncated normal
        mean: f64,
        /// Standard deviation of the untruncated normal
        std_dev: f64,
    },
}

impl DistributionKind {
    /// Check the distribution's parameters against the range `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem for a non-finite mean, a
    /// non-positive standard deviation, or a normal whose mass inside
    /// `[min, max)` is too small to stratify.
    pub fn validate(&self, min: f64, max: f64) -> std::result::Result<(), String> {
        match *self {
            Self::Uniform => Ok(()),
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return Err(format!("normal mean must be finite, got {mean}"));
                }
                if !(std_dev.is_finite() && std_dev > 0.0) {
                    return Err(format!(
                        "normal std_dev must be positive and finite, got {std_dev}"
                    ));
                }
                let normal = TruncatedNormal::new(min, max, mean, std_dev);
                let mass = normal.cdf_max - normal.cdf_min;
                if mass < MIN_NORMAL_MASS {
                    return Err(format!(
                        "range [{min}, {max}) holds almost none of the normal's mass \
                         (mean={mean}, std_dev={std_dev})"
                    ));
                }
                Ok(())
            }
        }
    }

    /// Bind the distribution to a concrete `[min, max)` range.
    #[must_use]
    pub fn over(self, min: f64, max: f64) -> Box<dyn Distribution> {
        match self {
            Self::Uniform => Box::new(Uniform::new(min, max)),
            Self::Normal { mean, std_dev } => {
                Box::new(TruncatedNormal::new(min, max, mean, std_dev))
            }
        }
    }
}

/// Uniform distribution over `[min, max)`: an affine rescale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    min: f64,
    max: f64,
}

impl Uniform {
    /// Create a uniform mapping over `[min, max)`.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Distribution for Uniform {
    fn inverse_cdf(&self, unit: f64) -> f64 {
        let value = unit.mul_add(self.max - self.min, self.min);
        clamp_half_open(value, self.min, self.max)
    }
}

/// Normal distribution truncated to `[min, max)`.
///
/// Maps `u` to `mean + std_dev * Phi^-1(Phi(a) + u * (Phi(b) - Phi(a)))`
/// with `a`, `b` the standardized bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncatedNormal {
    min: f64,
    max: f64,
    mean: f64,
    std_dev: f64,
    cdf_min: f64,
    cdf_max: f64,
}

impl TruncatedNormal {
    /// Create a truncated normal mapping.
    #[must_use]
    pub fn new(min: f64, max: f64, mean: f64, std_dev: f64) -> Self {
        Self {
            min,
            max,
            mean,
            std_dev,
            cdf_min: standard_normal_cdf((min - mean) / std_dev),
            cdf_max: standard_normal_cdf((max - mean) / std_dev),
        }
    }
}

impl Distribution for TruncatedNormal {
    fn inverse_cdf(&self, unit: f64) -> f64 {
        let p = unit.mul_add(self.cdf_max - self.cdf_min, self.cdf_min);
        let value = self
            .std_dev
            .mul_add(standard_normal_quantile(p), self.mean);
        clamp_half_open(value, self.min, self.max)
    }
}

/// Clamp into `[min, max)`; NaN collapses to `min`.
fn clamp_half_open(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() || value < min {
        min
    } else if value >= max {
        largest_below(max).max(min)
    } else {
        value
    }
}

/// The largest finite `f64` strictly below `x`.
fn largest_below(x: f64) -> f64 {
    if x > 0.0 {
        f64::from_bits(x.to_bits() - 1)
    } else if x == 0.0 {
        -f64::from_bits(1)
    } else {
        f64::from_bits(x.to_bits() + 1)
    }
}

/// Standard normal CDF via a Chebyshev fit of `erfc` (relative error < 1.2e-7).
fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

#[allow(clippy::unreadable_literal)]
fn erfc(x: f64) -> f64 {
    const COEFFS: [f64; 10] = [
        -1.26551223,
        1.00002368,
        0.37409196,
        0.09678418,
        -0.18628806,
        0.27886807,
        -1.13520398,
        1.48851587,
        -0.82215223,
        0.17087277,
    ];

    let z = x.abs();
    let t = 1.0 / 0.5f64.mul_add(z, 1.0);
    let poly = COEFFS.iter().rev().fold(0.0_f64, |acc, c| acc.mul_add(t, *c));
    let r = t * (-z).mul_add(z, poly).exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

/// Standard normal quantile (Acklam's rational approximation, relative
/// error < 1.15e-9). Returns `-inf` / `+inf` outside `(0, 1)`.
#[allow(clippy::unreadable_literal)]
fn standard_normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        let num = ((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5];
        let den = (((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0;
        num / den
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        let num = (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q;
        let den = ((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0;
        num / den
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_endpoints() {
        let dist = Uniform::new(-1.0, 1.0);
        assert!((dist.inverse_cdf(0.0) + 1.0).abs() < f64::EPSILON);
        assert!((dist.inverse_cdf(0.5)).abs() < f64::EPSILON);
        assert!(dist.inverse_cdf(1.0 - f64::EPSILON / 2.0) < 1.0);
    }

    #[test]
    fn test_uniform_never_reaches_max() {
        // Even a unit value of 1.0 stays inside the half-open range
        let dist = Uniform::new(0.0, 10.0);
        assert!(dist.inverse_cdf(1.0) < 10.0);
    }

    #[test]
    fn test_largest_below() {
        assert!(largest_below(1.0) < 1.0);
        assert!(largest_below(0.0) < 0.0);
        assert!(largest_below(-1.0) < -1.0);
        assert!((largest_below(-1.0) + 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_normal_cdf_reference_values() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((standard_normal_cdf(1.96) - 0.975_002).abs() < 1e-5);
        assert!((standard_normal_cdf(-1.0) - 0.158_655).abs() < 1e-5);
    }

    #[test]
    fn test_normal_quantile_inverts_cdf() {
        for x in [-2.5, -1.0, 0.0, 0.3, 1.7, 3.0] {
            let back = standard_normal_quantile(standard_normal_cdf(x));
            assert!((back - x).abs() < 1e-4, "x={x} back={back}");
        }
    }

    #[test]
    fn test_truncated_normal_stays_in_range() {
        let dist = TruncatedNormal::new(7.0, 8.0, 7.5, 0.2);
        for i in 0..100 {
            let u = f64::from(i) / 100.0;
            let v = dist.inverse_cdf(u);
            assert!((7.0..8.0).contains(&v), "u={u} v={v}");
        }
        assert!((dist.inverse_cdf(0.5) - 7.5).abs() < 1e-6);
    }

    #[test]
    fn test_normal_validation() {
        let bad = DistributionKind::Normal {
            mean: 0.0,
            std_dev: 0.0,
        };
        assert!(bad.validate(-1.0, 1.0).is_err());
        assert!(DistributionKind::Uniform.validate(-1.0, 1.0).is_ok());
    }

    #[test]
    fn test_normal_range_far_in_tail_rejected() {
        let tail = DistributionKind::Normal {
            mean: 0.0,
            std_dev: 1.0,
        };
        let err = tail.validate(40.0, 50.0).unwrap_err();
        assert!(err.contains("almost none"), "{err}");
        assert!(tail.validate(-40.0, -30.0).is_err());
        // A range a few sigma out still stratifies
        assert!(tail.validate(3.0, 4.0).is_ok());
    }
}
