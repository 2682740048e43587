//! Frequentist hypothesis tests for two-arm experiments.
//!
//! Each test returns a [`TestResult`] carrying the statistic, its
//! p-value under the requested [`Alternative`], and any warnings raised
//! by degenerate but valid inputs. `significant` is only populated when
//! the caller supplies an `alpha`.
//!
//! # Examples
//!
//! ```
//! use u_experiment::observations::ProportionSample;
//! use u_experiment::testing::{z_test_proportions, ZTestOptions};
//!
//! let r = z_test_proportions(
//!     ProportionSample::new(50, 1000),
//!     ProportionSample::new(65, 1000),
//!     &ZTestOptions { alpha: Some(0.05), ..Default::default() },
//! )
//! .unwrap();
//! assert!((r.statistic - 1.441).abs() < 1e-3);
//! assert_eq!(r.significant, Some(false));
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alternative::Alternative;
use crate::error::{ensure_optional_alpha, ExperimentError, Result};
use crate::intervals::WelchTerms;
use crate::observations::{MeanSample, ProportionSample};
use crate::special;

/// Minimum expected count per cell before the chi-square approximation
/// is flagged as unreliable.
pub const MIN_EXPECTED_COUNT: f64 = 5.0;

/// Tolerance when comparing observed and expected totals.
pub const TOTAL_MISMATCH_TOLERANCE: f64 = 1e-9;

/// Result of a hypothesis test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test statistic (z, t, or χ² depending on the test).
    pub statistic: f64,
    /// p-value in `[0, 1]` under `alternative`.
    pub p_value: f64,
    pub alternative: Alternative,
    /// Degrees of freedom; fractional for Welch, absent for the z-test.
    pub degrees_of_freedom: Option<f64>,
    /// `Some(p_value <= alpha)` when an alpha was supplied.
    pub significant: Option<bool>,
    pub warnings: Vec<String>,
}

impl TestResult {
    fn new(
        statistic: f64,
        p_value: f64,
        alternative: Alternative,
        degrees_of_freedom: Option<f64>,
        alpha: Option<f64>,
        warnings: Vec<String>,
    ) -> Self {
        let p_value = p_value.clamp(0.0, 1.0);
        Self {
            statistic,
            p_value,
            alternative,
            degrees_of_freedom,
            significant: alpha.map(|a| p_value <= a),
            warnings,
        }
    }
}

/// Options for [`z_test_proportions`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZTestOptions {
    pub alternative: Alternative,
    pub alpha: Option<f64>,
}

/// Options for [`welch_t_test`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WelchOptions {
    pub alternative: Alternative,
    pub alpha: Option<f64>,
}

/// Options for [`chi_square_goodness_of_fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChiSquareOptions {
    /// Defaults to [`Alternative::Greater`], the usual upper-tail test.
    pub alternative: Alternative,
    pub alpha: Option<f64>,
}

impl Default for ChiSquareOptions {
    fn default() -> Self {
        Self {
            alternative: Alternative::Greater,
            alpha: None,
        }
    }
}

// ============================================================================
// Proportions
// ============================================================================

/// Pooled two-proportion z-test of `H₀: p_control = p_treatment`.
///
/// # Algorithm
///
/// ```text
/// p̄  = (s_c + s_t) / (n_c + n_t)
/// SE = √(p̄(1 − p̄)(1/n_c + 1/n_t))
/// z  = (p_t − p_c) / SE
/// ```
///
/// When both arms are all-success or all-failure the pooled variance is
/// zero; the result is then `z = 0`, `p = 1` with a warning.
///
/// # Errors
///
/// Either sample has `total == 0` or `successes > total`; `alpha`
/// outside `(0, 1)`.
pub fn z_test_proportions(
    control: ProportionSample,
    treatment: ProportionSample,
    options: &ZTestOptions,
) -> Result<TestResult> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    let alpha = ensure_optional_alpha(options.alpha)?;
    let alternative = options.alternative;

    let nc = control.total as f64;
    let nt = treatment.total as f64;
    let pooled = (control.successes + treatment.successes) as f64 / (nc + nt);
    let se = (pooled * (1.0 - pooled) * (1.0 / nc + 1.0 / nt)).sqrt();

    if se <= 0.0 {
        let warning = format!(
            "pooled variance is zero (pooled rate {pooled}); no evidence of a difference"
        );
        debug!(pooled, "z-test degenerate input");
        return Ok(TestResult::new(
            0.0,
            1.0,
            alternative,
            None,
            alpha,
            vec![warning],
        ));
    }

    let z = (treatment.rate() - control.rate()) / se;
    let p = alternative.normal_p_value(z);
    Ok(TestResult::new(z, p, alternative, None, alpha, Vec::new()))
}

// ============================================================================
// Means
// ============================================================================

/// Welch's unequal-variance t-test from summary statistics.
///
/// `t = (m_t − m_c) / √(s_c²/n_c + s_t²/n_t)` with Welch–Satterthwaite
/// degrees of freedom.
///
/// # References
///
/// Welch (1947). "The generalization of Student's problem when several
/// different population variances are involved". Biometrika, 34, 28–35.
///
/// # Errors
///
/// Negative or non-finite `std_dev`, `n < 2`, a zero standard error, or
/// `alpha` outside `(0, 1)`.
///
/// # Examples
///
/// ```
/// use u_experiment::observations::MeanSample;
/// use u_experiment::testing::{welch_t_test, WelchOptions};
///
/// let r = welch_t_test(
///     MeanSample::new(5.0, 0.2, 10),
///     MeanSample::new(7.0, 0.2, 10),
///     &WelchOptions::default(),
/// )
/// .unwrap();
/// assert!(r.p_value < 0.001);
/// ```
pub fn welch_t_test(
    control: MeanSample,
    treatment: MeanSample,
    options: &WelchOptions,
) -> Result<TestResult> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    let alpha = ensure_optional_alpha(options.alpha)?;

    let welch = WelchTerms::new(&control, &treatment)?;
    let t = (treatment.mean - control.mean) / welch.se;
    let p = t_p_value(options.alternative, t, welch.df);
    Ok(TestResult::new(
        t,
        p,
        options.alternative,
        Some(welch.df),
        alpha,
        Vec::new(),
    ))
}

fn t_p_value(alternative: Alternative, t: f64, df: f64) -> f64 {
    match alternative {
        Alternative::TwoSided => 2.0 * special::t_cdf_unchecked(-t.abs(), df),
        Alternative::Greater => special::t_cdf_unchecked(-t, df),
        Alternative::Less => special::t_cdf_unchecked(t, df),
    }
}

// ============================================================================
// Chi-square
// ============================================================================

/// Chi-square goodness-of-fit test: `χ² = Σ (Oᵢ − Eᵢ)² / Eᵢ`, df = k − 1.
///
/// The upper tail (`Greater`) is the conventional test. `Less` uses the
/// lower tail, and `TwoSided` doubles the smaller tail, capped at 1.
///
/// Warnings are attached (not errors) when any expected count is below
/// [`MIN_EXPECTED_COUNT`] or when the observed and expected totals differ
/// by more than [`TOTAL_MISMATCH_TOLERANCE`].
///
/// # Errors
///
/// Length mismatch, fewer than two cells, a negative or non-finite
/// observed count, a non-positive or non-finite expected count, or
/// `alpha` outside `(0, 1)`.
///
/// # Examples
///
/// ```
/// use u_experiment::testing::{chi_square_goodness_of_fit, ChiSquareOptions};
///
/// let r = chi_square_goodness_of_fit(
///     &[10.0, 20.0, 30.0],
///     &[20.0, 20.0, 20.0],
///     &ChiSquareOptions::default(),
/// )
/// .unwrap();
/// assert!((r.statistic - 10.0).abs() < 1e-12);
/// assert!((r.p_value - (-5.0_f64).exp()).abs() < 1e-10);
/// ```
pub fn chi_square_goodness_of_fit(
    observed: &[f64],
    expected: &[f64],
    options: &ChiSquareOptions,
) -> Result<TestResult> {
    if observed.len() != expected.len() {
        return Err(ExperimentError::invalid(
            "expected",
            format!(
                "length {} does not match observed length {}",
                expected.len(),
                observed.len()
            ),
        ));
    }
    if observed.len() < 2 {
        return Err(ExperimentError::invalid(
            "observed",
            "at least two categories are required",
        ));
    }
    if let Some(o) = observed.iter().find(|o| !o.is_finite() || **o < 0.0) {
        return Err(ExperimentError::invalid(
            "observed",
            format!("counts must be finite and >= 0, got {o}"),
        ));
    }
    if let Some(e) = expected.iter().find(|e| !e.is_finite() || **e <= 0.0) {
        return Err(ExperimentError::invalid(
            "expected",
            format!("counts must be finite and > 0, got {e}"),
        ));
    }
    let alpha = ensure_optional_alpha(options.alpha)?;

    let mut warnings = Vec::new();
    let small = expected.iter().filter(|&&e| e < MIN_EXPECTED_COUNT).count();
    if small > 0 {
        warnings.push(format!(
            "{small} expected count(s) below {MIN_EXPECTED_COUNT}; chi-square approximation may be inaccurate"
        ));
    }
    let observed_total: f64 = observed.iter().sum();
    let expected_total: f64 = expected.iter().sum();
    if (observed_total - expected_total).abs() > TOTAL_MISMATCH_TOLERANCE {
        warnings.push(format!(
            "observed total {observed_total} differs from expected total {expected_total}"
        ));
    }
    if !warnings.is_empty() {
        debug!(?warnings, "chi-square goodness-of-fit warnings");
    }

    let statistic: f64 = observed
        .iter()
        .zip(expected)
        .map(|(o, e)| (o - e).powi(2) / e)
        .sum();
    let df = (observed.len() - 1) as f64;

    let upper = special::chi_square_sf(statistic, df)?;
    let lower = special::chi_square_cdf(statistic, df)?;
    let p = match options.alternative {
        Alternative::Greater => upper,
        Alternative::Less => lower,
        Alternative::TwoSided => (2.0 * upper.min(lower)).min(1.0),
    };

    Ok(TestResult::new(
        statistic,
        p,
        options.alternative,
        Some(df),
        alpha,
        warnings,
    ))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn z_p_value_in_unit(n1 in 1_u64..2000, n2 in 1_u64..2000, f1 in 0.0_f64..=1.0, f2 in 0.0_f64..=1.0) {
            let c = ProportionSample::new((n1 as f64 * f1) as u64, n1);
            let t = ProportionSample::new((n2 as f64 * f2) as u64, n2);
            let r = z_test_proportions(c, t, &ZTestOptions::default()).unwrap();
            prop_assert!((0.0..=1.0).contains(&r.p_value));
        }

        #[test]
        fn z_swapping_arms_negates(n1 in 10_u64..2000, n2 in 10_u64..2000, f1 in 0.01_f64..0.99, f2 in 0.01_f64..0.99) {
            let c = ProportionSample::new((n1 as f64 * f1) as u64, n1);
            let t = ProportionSample::new((n2 as f64 * f2) as u64, n2);
            let a = z_test_proportions(c, t, &ZTestOptions::default()).unwrap();
            let b = z_test_proportions(t, c, &ZTestOptions::default()).unwrap();
            prop_assert!((a.statistic + b.statistic).abs() < 1e-9);
            prop_assert!((a.p_value - b.p_value).abs() < 1e-9);
        }

        #[test]
        fn chi_square_p_in_unit(cells in prop::collection::vec(0.0_f64..100.0, 2..8)) {
            let expected = vec![10.0; cells.len()];
            for alternative in [Alternative::Greater, Alternative::Less, Alternative::TwoSided] {
                let r = chi_square_goodness_of_fit(
                    &cells,
                    &expected,
                    &ChiSquareOptions { alternative, alpha: None },
                )
                .unwrap();
                prop_assert!(r.statistic >= 0.0);
                prop_assert!((0.0..=1.0).contains(&r.p_value));
            }
        }
    }
}
