//! Volume rounding to the pipette resolution

/// Tolerance on the `sample + diluent == final` invariant (µL)
pub const SUM_TOLERANCE: f64 = 0.01;

/// Round half away from zero to the nearest multiple of `step`
///
/// The result is cleaned to nine decimals so that `12.3` does not come back as
/// `12.300000000000001`.
///
/// ```rust
/// use norm_rs::calculator::rounding::round_to_resolution;
///
/// assert_eq!(round_to_resolution(12.34, 0.1), 12.3);
/// assert_eq!(round_to_resolution(12.35, 0.1), 12.4);
/// assert_eq!(round_to_resolution(-0.25, 0.5), -0.5);
/// ```
pub fn round_to_resolution(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !step.is_finite() {
        return value;
    }
    // f64::round is half away from zero; the 1e-9 nudge absorbs the binary
    // representation error of values like 12.35
    let scaled = value / step;
    let nudged = scaled + scaled.signum() * 1e-9;
    clean(nudged.round() * step)
}

/// Round down (toward zero) to a multiple of `step`
pub fn floor_to_resolution(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !step.is_finite() {
        return value;
    }
    let scaled = value / step;
    let nudged = scaled + scaled.signum() * 1e-9;
    clean(nudged.trunc() * step)
}

/// Whether `a + b` equals `total` within [`SUM_TOLERANCE`]
pub fn sums_to(a: f64, b: f64, total: f64) -> bool {
    (a + b - total).abs() <= SUM_TOLERANCE
}

fn clean(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}
