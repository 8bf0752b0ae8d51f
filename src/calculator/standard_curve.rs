//! BCA standard curve
//!
//! Least-squares polynomial fit of absorbance against the known concentration
//! of the calibration wells, and its inverse. This is what turns a read BCA
//! plate into the concentrations the normalizer needs.
//!
//! # Model
//!
//! ```text
//! A(c) = β₀ + β₁·c            (degree 1)
//! A(c) = β₀ + β₁·c + β₂·c²    (degree 2, typical for BCA above 1 µg/µL)
//! ```
//!
//! The coefficients solve the normal equations through an SVD of the
//! Vandermonde matrix, which stays well-behaved when standards are nearly
//! collinear.
//!
//! # Example
//!
//! ```rust
//! use norm_rs::calculator::StandardCurve;
//!
//! let standards = [(0.0, 0.1), (0.5, 0.35), (1.0, 0.6), (2.0, 1.1)];
//! let curve = StandardCurve::fit(&standards, 1).unwrap();
//!
//! let c = curve.concentration_for(0.6).unwrap();
//! assert!((c - 1.0).abs() < 1e-9);
//! ```

use nalgebra::{DMatrix, DVector};

use crate::error::{NormError, NormResult};

/// Fitted calibration curve
#[derive(Debug, Clone)]
pub struct StandardCurve {
    /// β₀, β₁[, β₂]
    coefficients: DVector<f64>,
    /// Calibrated concentration range (µg/µL)
    range: (f64, f64),
    r_squared: f64,
}

impl StandardCurve {
    /// Fit `(concentration, absorbance)` pairs with a polynomial of `degree` 1 or 2
    ///
    /// # Errors
    ///
    /// - unsupported degree
    /// - fewer than `degree + 2` points, or fewer distinct concentrations than coefficients
    /// - non-finite values
    pub fn fit(points: &[(f64, f64)], degree: usize) -> NormResult<Self> {
        if !(1..=2).contains(&degree) {
            return Err(NormError::Calibration(format!(
                "standard curve degree must be 1 or 2, got {degree}"
            )));
        }
        if points.len() < degree + 2 {
            return Err(NormError::Calibration(format!(
                "a degree {degree} curve needs at least {} standards, got {}",
                degree + 2,
                points.len()
            )));
        }
        if points.iter().any(|(c, a)| !c.is_finite() || !a.is_finite()) {
            return Err(NormError::Calibration("NaN or Inf in standards".to_string()));
        }

        let mut distinct: Vec<f64> = points.iter().map(|p| p.0).collect();
        distinct.sort_by(|a, b| a.total_cmp(b));
        distinct.dedup();
        if distinct.len() < degree + 1 {
            return Err(NormError::Calibration(
                "not enough distinct standard concentrations".to_string(),
            ));
        }

        let n = points.len();
        let x = DMatrix::from_fn(n, degree + 1, |i, j| points[i].0.powi(j as i32));
        let y = DVector::from_iterator(n, points.iter().map(|p| p.1));

        let coefficients = x
            .clone()
            .svd(true, true)
            .solve(&y, 1e-12)
            .map_err(|e| NormError::Calibration(e.to_string()))?;

        let fitted = &x * &coefficients;
        let mean = y.mean();
        let ss_res: f64 = (&y - &fitted).iter().map(|r| r * r).sum();
        let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        let range = (distinct[0], distinct[distinct.len() - 1]);

        log::info!(
            "standard curve: degree {}, {} standards, R² = {:.4}",
            degree,
            n,
            r_squared
        );

        Ok(Self {
            coefficients,
            range,
            r_squared,
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[f64] {
        self.coefficients.as_slice()
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Calibrated concentration range (µg/µL)
    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Predicted absorbance at a concentration
    pub fn absorbance_at(&self, concentration: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .map(|(k, b)| b * concentration.powi(k as i32))
            .sum()
    }

    /// Concentration giving `absorbance`, restricted to the calibrated range
    ///
    /// # Errors
    ///
    /// When no root of the curve lies in the calibrated range (sample reads
    /// above the top standard or below the blank).
    pub fn concentration_for(&self, absorbance: f64) -> NormResult<f64> {
        let (lo, hi) = self.range;
        let slack = 1e-9 * (hi - lo).abs().max(1.0);
        let in_range = |c: f64| c >= lo - slack && c <= hi + slack;

        let b = self.coefficients.as_slice();
        let candidates: Vec<f64> = match b.len() {
            2 => {
                if b[1].abs() < f64::EPSILON {
                    vec![]
                } else {
                    vec![(absorbance - b[0]) / b[1]]
                }
            }
            _ => {
                // β₂c² + β₁c + (β₀ − A) = 0
                let (a2, a1, a0) = (b[2], b[1], b[0] - absorbance);
                if a2.abs() < f64::EPSILON {
                    if a1.abs() < f64::EPSILON { vec![] } else { vec![-a0 / a1] }
                } else {
                    let disc = a1 * a1 - 4.0 * a2 * a0;
                    if disc < 0.0 {
                        vec![]
                    } else {
                        let sq = disc.sqrt();
                        vec![(-a1 + sq) / (2.0 * a2), (-a1 - sq) / (2.0 * a2)]
                    }
                }
            }
        };

        candidates
            .into_iter()
            .find(|c| in_range(*c))
            .map(|c| c.clamp(lo, hi))
            .ok_or_else(|| {
                NormError::Calibration(format!(
                    "absorbance {absorbance} is outside the calibrated range \
                     {lo}–{hi} µg/µL"
                ))
            })
    }

    /// Concentration of the original sample read at a `dilution` factor
    pub fn sample_concentration(&self, absorbance: f64, dilution: f64) -> NormResult<f64> {
        Ok(self.concentration_for(absorbance)? * dilution)
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_standards() -> Vec<(f64, f64)> {
        // A = 0.1 + 0.5 c
        [0.0, 0.25, 0.5, 1.0, 2.0].iter().map(|&c| (c, 0.1 + 0.5 * c)).collect()
    }

    #[test]
    fn test_linear_fit_recovers_coefficients() {
        let curve = StandardCurve::fit(&linear_standards(), 1).unwrap();
        assert_relative_eq!(curve.coefficients()[0], 0.1, epsilon = 1e-10);
        assert_relative_eq!(curve.coefficients()[1], 0.5, epsilon = 1e-10);
        assert_relative_eq!(curve.r_squared(), 1.0, epsilon = 1e-10);
        assert_eq!(curve.degree(), 1);
    }

    #[test]
    fn test_quadratic_fit_and_inverse() {
        // A = 0.05 + 0.8 c − 0.1 c²
        let standards: Vec<(f64, f64)> = [0.0, 0.25, 0.5, 1.0, 1.5, 2.0]
            .iter()
            .map(|&c| (c, 0.05 + 0.8 * c - 0.1 * c * c))
            .collect();
        let curve = StandardCurve::fit(&standards, 2).unwrap();

        let a = curve.absorbance_at(1.2);
        assert_relative_eq!(curve.concentration_for(a).unwrap(), 1.2, epsilon = 1e-8);
    }

    #[test]
    fn test_out_of_range_absorbance() {
        let curve = StandardCurve::fit(&linear_standards(), 1).unwrap();
        // top standard reads 1.1
        assert!(curve.concentration_for(1.5).is_err());
        assert!(curve.concentration_for(0.0).is_err());
    }

    #[test]
    fn test_sample_concentration_scales_by_dilution() {
        let curve = StandardCurve::fit(&linear_standards(), 1).unwrap();
        let c = curve.sample_concentration(0.35, 10.0).unwrap();
        assert_relative_eq!(c, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_rejects_bad_inputs() {
        assert!(StandardCurve::fit(&linear_standards(), 3).is_err());
        assert!(StandardCurve::fit(&[(0.0, 0.1), (1.0, 0.6)], 1).is_err());
        assert!(StandardCurve::fit(&[(1.0, 0.1), (1.0, 0.2), (1.0, 0.3)], 1).is_err());
        assert!(StandardCurve::fit(&[(0.0, f64::NAN), (1.0, 0.6), (2.0, 1.1)], 1).is_err());
    }
}
