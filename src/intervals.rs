//! Confidence intervals for rates, means, and their differences.
//!
//! | Function | Method |
//! |---|---|
//! | [`proportion_confidence_interval`] | Wilson score |
//! | [`mean_confidence_interval`] | Student-t, df = n − 1 |
//! | [`proportion_difference_ci`] | Newcombe hybrid of two Wilson intervals |
//! | [`mean_difference_ci`] | Welch with Welch–Satterthwaite df |
//!
//! Differences are always reported as treatment minus control (second
//! argument minus first). Every result satisfies
//! `half_width == (upper - lower) / 2`, and a higher confidence level
//! never yields a narrower interval.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_open_unit, ExperimentError, Result};
use crate::observations::{MeanSample, ProportionSample};
use crate::special;

/// Default confidence level for every interval in this module.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// A two-sided confidence interval around a point estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    /// Always `(upper - lower) / 2`.
    pub half_width: f64,
    pub level: f64,
}

impl ConfidenceInterval {
    fn from_bounds(estimate: f64, lower: f64, upper: f64, level: f64) -> Self {
        Self {
            estimate,
            lower,
            upper,
            half_width: (upper - lower) / 2.0,
            level,
        }
    }

    /// Whether `value` lies inside the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Two-sided normal critical value `z_{1-(1-level)/2}`.
fn normal_critical(level: f64) -> f64 {
    special::normal_ppf_unchecked(1.0 - (1.0 - level) / 2.0)
}

/// Unclamped Wilson bounds as `(lower, upper)`.
fn wilson_bounds(sample: &ProportionSample, z: f64) -> (f64, f64) {
    let n = sample.total as f64;
    let p = sample.rate();
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let spread = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    ((center - spread).max(0.0), (center + spread).min(1.0))
}

/// Wilson score interval for a single proportion.
///
/// # Algorithm
/// With `p̂ = s/n` and critical value `z`:
/// ```text
/// center = (p̂ + z²/2n) / (1 + z²/n)
/// spread = z·√(p̂(1−p̂)/n + z²/4n²) / (1 + z²/n)
/// ```
/// Bounds are clamped to `[0, 1]`; the estimate is `p̂`.
///
/// Reference: Wilson (1927), "Probable Inference, the Law of Succession,
/// and Statistical Inference", *JASA* 22(158).
///
/// # Errors
/// `total == 0`, `successes > total`, or `level` outside `(0, 1)`.
///
/// # Examples
/// ```
/// use u_experiment::intervals::proportion_confidence_interval;
/// use u_experiment::observations::ProportionSample;
///
/// let ci = proportion_confidence_interval(ProportionSample::new(50, 1000), 0.95).unwrap();
/// assert!(ci.lower < 0.05 && 0.05 < ci.upper);
/// assert_eq!(ci.half_width, (ci.upper - ci.lower) / 2.0);
/// ```
pub fn proportion_confidence_interval(
    sample: ProportionSample,
    level: f64,
) -> Result<ConfidenceInterval> {
    sample.validate("sample")?;
    ensure_open_unit("level", level)?;

    let (lower, upper) = wilson_bounds(&sample, normal_critical(level));
    Ok(ConfidenceInterval::from_bounds(sample.rate(), lower, upper, level))
}

/// Student-t interval for a mean: `x̄ ± t_{df} · s/√n`, df = n − 1.
///
/// # Errors
/// Invalid `sample` (non-finite mean, negative std_dev, n < 2), or
/// `level` outside `(0, 1)`.
pub fn mean_confidence_interval(sample: MeanSample, level: f64) -> Result<ConfidenceInterval> {
    sample.validate("sample")?;
    ensure_open_unit("level", level)?;

    let df = (sample.n - 1) as f64;
    let t = special::t_ppf_unchecked(1.0 - (1.0 - level) / 2.0, df);
    let margin = t * sample.variance_of_mean().sqrt();
    Ok(ConfidenceInterval::from_bounds(
        sample.mean,
        sample.mean - margin,
        sample.mean + margin,
        level,
    ))
}

/// Interval for `p_treatment − p_control` (Newcombe's hybrid score method).
///
/// # Algorithm
/// Builds a Wilson interval `[l, u]` for each arm and combines the
/// distances from each point estimate by root-sum-of-squares:
/// ```text
/// lower = d − √((p_t − l_t)² + (u_c − p_c)²)
/// upper = d + √((u_t − p_t)² + (p_c − l_c)²)
/// ```
/// with `d = p_t − p_c`, then clamps to `[-1, 1]`.
///
/// Reference: Newcombe (1998), "Interval estimation for the difference
/// between independent proportions", *Statistics in Medicine* 17(8),
/// method 10.
///
/// # Errors
/// Either sample invalid, or `level` outside `(0, 1)`.
pub fn proportion_difference_ci(
    control: ProportionSample,
    treatment: ProportionSample,
    level: f64,
) -> Result<ConfidenceInterval> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    ensure_open_unit("level", level)?;

    let z = normal_critical(level);
    let (lc, uc) = wilson_bounds(&control, z);
    let (lt, ut) = wilson_bounds(&treatment, z);
    let pc = control.rate();
    let pt = treatment.rate();
    let diff = pt - pc;

    let lower = diff - ((pt - lt).powi(2) + (uc - pc).powi(2)).sqrt();
    let upper = diff + ((ut - pt).powi(2) + (pc - lc).powi(2)).sqrt();
    Ok(ConfidenceInterval::from_bounds(
        diff,
        lower.max(-1.0),
        upper.min(1.0),
        level,
    ))
}

/// Welch interval for `mean_treatment − mean_control`.
///
/// # Algorithm
/// ```text
/// se = √(s_c²/n_c + s_t²/n_t)
/// df = se⁴ / ((s_c²/n_c)²/(n_c−1) + (s_t²/n_t)²/(n_t−1))
/// ```
/// and the interval is `d ± t_{df} · se`.
///
/// # Errors
/// Either sample invalid, `level` outside `(0, 1)`, or a zero standard
/// error (both standard deviations zero).
pub fn mean_difference_ci(
    control: MeanSample,
    treatment: MeanSample,
    level: f64,
) -> Result<ConfidenceInterval> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    ensure_open_unit("level", level)?;

    let welch = WelchTerms::new(&control, &treatment)?;
    let t = special::t_ppf_unchecked(1.0 - (1.0 - level) / 2.0, welch.df);
    let diff = treatment.mean - control.mean;
    let margin = t * welch.se;
    Ok(ConfidenceInterval::from_bounds(
        diff,
        diff - margin,
        diff + margin,
        level,
    ))
}

/// Standard error and Welch–Satterthwaite degrees of freedom.
pub(crate) struct WelchTerms {
    pub se: f64,
    pub df: f64,
}

impl WelchTerms {
    pub(crate) fn new(control: &MeanSample, treatment: &MeanSample) -> Result<Self> {
        let vc = control.variance_of_mean();
        let vt = treatment.variance_of_mean();
        let se = (vc + vt).sqrt();
        if se <= 0.0 {
            return Err(ExperimentError::invalid(
                "std_dev",
                "combined standard error is zero; both groups have zero variance",
            ));
        }
        let ws_denominator =
            vc * vc / (control.n - 1) as f64 + vt * vt / (treatment.n - 1) as f64;
        if ws_denominator <= 0.0 {
            return Err(ExperimentError::invalid(
                "std_dev",
                "Welch–Satterthwaite denominator is not positive",
            ));
        }
        let df = (vc + vt).powi(2) / ws_denominator;
        Ok(Self { se, df })
    }
}
