//! Always-valid inference with a mixture sequential probability ratio test.
//!
//! Conversion rates are Haldane-corrected, `(s + 0.5) / (n + 1)`, and
//! mapped through the variance-stabilizing transform `θ = 2·asin(√p)`,
//! under which the difference `Δ = θ_t − θ_c` is approximately normal
//! with variance `V = 1/n_c + 1/n_t`. Mixing the alternative over
//! `Δ ~ N(0, τ²)` gives the closed-form log-evidence
//!
//! ```text
//! ln Λ = ½ ln(V / (V + τ²)) + τ²Δ² / (2V(V + τ²))
//! ```
//!
//! The caller carries the running maximum of `ln Λ` across looks; the
//! always-valid p-value is `exp(−max)` and never increases over time.
//!
//! ## References
//!
//! - Johari R, Koomen P, Pekelis L, Walsh D (2017). Peeking at A/B tests.
//!   *KDD '17*.
//! - Robbins H (1970). Statistical methods related to the law of the
//!   iterated logarithm. *Ann. Math. Statist.* 41:1397–1409.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alternative::Alternative;
use crate::error::{ensure_open_unit, ensure_positive, ensure_probability, ExperimentError, Result};
use crate::observations::ProportionSample;
use crate::random::SeededRandom;

pub const DEFAULT_ALPHA: f64 = 0.05;
/// Standard deviation of the normal mixing distribution on `Δ`.
pub const DEFAULT_TAU: f64 = 0.1;
pub const DEFAULT_MAX_PAIRS: u64 = 1_000;
pub const DEFAULT_SIMULATION_RUNS: usize = 1_000;
pub const DEFAULT_SEED: u32 = 42;

/// Largest log-evidence whose exponential is finite.
const MAX_FINITE_LOG: f64 = 709.782_712_893_384;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsprtOptions {
    pub alpha: f64,
    pub tau: f64,
    /// Running maximum returned by the previous look; `None` on the first.
    pub previous_max_log_e_value: Option<f64>,
    /// Only [`Alternative::TwoSided`] is supported.
    pub alternative: Alternative,
}

impl Default for MsprtOptions {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            tau: DEFAULT_TAU,
            previous_max_log_e_value: None,
            alternative: Alternative::TwoSided,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsprtResult {
    /// Log-evidence at this look alone.
    pub log_e_value: f64,
    /// Running maximum; pass back as `previous_max_log_e_value`.
    pub max_log_e_value: f64,
    /// `exp(max_log_e_value)`, saturating at `f64::MAX` so the record
    /// always serializes as a number.
    pub e_value: f64,
    /// Always-valid p-value, `min(1, exp(−max_log_e_value))`.
    pub p_value: f64,
    pub can_stop: bool,
    /// Transformed effect `Δ = θ_t − θ_c`.
    pub effect: f64,
    /// Look variance `1/n_c + 1/n_t`.
    pub variance: f64,
    pub control_rate: f64,
    pub treatment_rate: f64,
    pub alpha: f64,
    pub tau: f64,
}

fn corrected_rate(successes: u64, total: u64) -> f64 {
    (successes as f64 + 0.5) / (total as f64 + 1.0)
}

fn arcsine(p: f64) -> f64 {
    2.0 * p.sqrt().asin()
}

/// Returns `(log_evidence, effect, variance)` for one look.
fn log_evidence(control: &ProportionSample, treatment: &ProportionSample, tau: f64) -> (f64, f64, f64) {
    let pc = corrected_rate(control.successes, control.total);
    let pt = corrected_rate(treatment.successes, treatment.total);
    let effect = arcsine(pt) - arcsine(pc);
    let v = 1.0 / control.total as f64 + 1.0 / treatment.total as f64;
    let t2 = tau * tau;
    let log_e = 0.5 * (v / (v + t2)).ln() + t2 * effect * effect / (2.0 * v * (v + t2));
    (log_e, effect, v)
}

fn e_value_from_log_e(max_log_e: f64) -> f64 {
    if max_log_e >= MAX_FINITE_LOG {
        f64::MAX
    } else {
        max_log_e.exp()
    }
}

fn p_value_from_log_e(max_log_e: f64) -> f64 {
    if max_log_e <= 0.0 {
        1.0
    } else if max_log_e >= MAX_FINITE_LOG {
        0.0
    } else {
        (-max_log_e).exp()
    }
}

fn ensure_two_sided(alternative: Alternative) -> Result<()> {
    if alternative != Alternative::TwoSided {
        return Err(ExperimentError::invalid(
            "alternative",
            format!("mSPRT supports only two-sided, got {alternative}"),
        ));
    }
    Ok(())
}

/// Evaluates one look of the always-valid test.
///
/// # Errors
///
/// Either sample has `total == 0` or `successes > total`; `alpha`
/// outside `(0, 1)`; `tau` not finite and positive; a NaN or `+∞`
/// previous maximum; any alternative other than two-sided.
///
/// # Examples
///
/// ```
/// use u_experiment::msprt::{msprt_test, MsprtOptions};
/// use u_experiment::observations::ProportionSample;
///
/// let first = msprt_test(
///     ProportionSample::new(40, 1000),
///     ProportionSample::new(80, 1000),
///     &MsprtOptions::default(),
/// )
/// .unwrap();
/// assert!(first.can_stop);
///
/// // A later, weaker look cannot lower the carried evidence.
/// let next = msprt_test(
///     ProportionSample::new(90, 2000),
///     ProportionSample::new(95, 2000),
///     &MsprtOptions {
///         previous_max_log_e_value: Some(first.max_log_e_value),
///         ..Default::default()
///     },
/// )
/// .unwrap();
/// assert_eq!(next.max_log_e_value, first.max_log_e_value);
/// ```
pub fn msprt_test(
    control: ProportionSample,
    treatment: ProportionSample,
    options: &MsprtOptions,
) -> Result<MsprtResult> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    let alpha = ensure_open_unit("alpha", options.alpha)?;
    let tau = ensure_positive("tau", options.tau)?;
    ensure_two_sided(options.alternative)?;
    let previous = match options.previous_max_log_e_value {
        None => f64::NEG_INFINITY,
        Some(v) if v.is_nan() || v == f64::INFINITY => {
            return Err(ExperimentError::invalid(
                "previous_max_log_e_value",
                format!("must be finite or -inf, got {v}"),
            ))
        }
        Some(v) => v,
    };

    let (log_e, effect, variance) = log_evidence(&control, &treatment, tau);
    let max_log_e = previous.max(log_e);
    let p_value = p_value_from_log_e(max_log_e);

    Ok(MsprtResult {
        log_e_value: log_e,
        max_log_e_value: max_log_e,
        e_value: e_value_from_log_e(max_log_e),
        p_value,
        can_stop: p_value <= alpha,
        effect,
        variance,
        control_rate: corrected_rate(control.successes, control.total),
        treatment_rate: corrected_rate(treatment.successes, treatment.total),
        alpha,
        tau,
    })
}

// ============================================================================
// Simulation harnesses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeIErrorSimulationOptions {
    /// Conversion rate shared by both arms.
    pub null_rate: f64,
    pub runs: usize,
    pub max_pairs: u64,
    pub alpha: f64,
    pub tau: f64,
    pub seed: u32,
}

impl Default for TypeIErrorSimulationOptions {
    fn default() -> Self {
        Self {
            null_rate: 0.05,
            runs: DEFAULT_SIMULATION_RUNS,
            max_pairs: DEFAULT_MAX_PAIRS,
            alpha: DEFAULT_ALPHA,
            tau: DEFAULT_TAU,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeIErrorSimulationResult {
    pub runs: usize,
    pub rejections: usize,
    /// `rejections / runs`.
    pub type_i_error_rate: f64,
    pub threshold_log_e: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerSimulationOptions {
    pub control_rate: f64,
    pub treatment_rate: f64,
    pub runs: usize,
    pub max_pairs: u64,
    pub alpha: f64,
    pub tau: f64,
    pub seed: u32,
}

impl Default for PowerSimulationOptions {
    fn default() -> Self {
        Self {
            control_rate: 0.05,
            treatment_rate: 0.05,
            runs: DEFAULT_SIMULATION_RUNS,
            max_pairs: DEFAULT_MAX_PAIRS,
            alpha: DEFAULT_ALPHA,
            tau: DEFAULT_TAU,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSimulationResult {
    pub runs: usize,
    pub detections: usize,
    /// `detections / runs`.
    pub power: f64,
    /// Mean pair index at which detected runs stopped.
    pub mean_stopping_pair: Option<f64>,
    pub median_stopping_pair: Option<f64>,
    pub threshold_log_e: f64,
}

struct PairedRuns {
    control_rate: f64,
    treatment_rate: f64,
    runs: usize,
    max_pairs: u64,
    threshold: f64,
    tau: f64,
    seed: u32,
}

impl PairedRuns {
    /// Stopping pair of every run that crossed the threshold.
    fn stopping_pairs(&self) -> Vec<u64> {
        let mut rng = SeededRandom::new(self.seed);
        let mut stops = Vec::new();
        for _ in 0..self.runs {
            let mut control = ProportionSample::new(0, 0);
            let mut treatment = ProportionSample::new(0, 0);
            let mut running_max = f64::NEG_INFINITY;
            for pair in 1..=self.max_pairs {
                control.total = pair;
                treatment.total = pair;
                if rng.next_bool(self.control_rate) {
                    control.successes += 1;
                }
                if rng.next_bool(self.treatment_rate) {
                    treatment.successes += 1;
                }
                let (log_e, _, _) = log_evidence(&control, &treatment, self.tau);
                running_max = running_max.max(log_e);
                if running_max >= self.threshold {
                    stops.push(pair);
                    break;
                }
            }
        }
        stops
    }
}

fn validate_simulation(runs: usize, max_pairs: u64, alpha: f64, tau: f64) -> Result<()> {
    if runs == 0 {
        return Err(ExperimentError::invalid("runs", "must be at least 1"));
    }
    if max_pairs == 0 {
        return Err(ExperimentError::invalid("max_pairs", "must be at least 1"));
    }
    ensure_open_unit("alpha", alpha)?;
    ensure_positive("tau", tau)?;
    Ok(())
}

/// Estimates the Type-I error rate under a shared null rate.
///
/// Each run feeds Bernoulli pairs (control draw, then treatment draw)
/// into the test one pair at a time and stops as soon as the running
/// log-evidence reaches `−ln(alpha)`. A run that reaches `max_pairs`
/// without crossing counts as a non-rejection.
///
/// # Errors
///
/// `null_rate` outside `[0, 1]`, zero `runs` or `max_pairs`, `alpha`
/// outside `(0, 1)`, or non-positive `tau`.
pub fn simulate_type_i_rate(
    options: &TypeIErrorSimulationOptions,
) -> Result<TypeIErrorSimulationResult> {
    let rate = ensure_probability("null_rate", options.null_rate)?;
    validate_simulation(options.runs, options.max_pairs, options.alpha, options.tau)?;

    let threshold = -options.alpha.ln();
    let stops = PairedRuns {
        control_rate: rate,
        treatment_rate: rate,
        runs: options.runs,
        max_pairs: options.max_pairs,
        threshold,
        tau: options.tau,
        seed: options.seed,
    }
    .stopping_pairs();

    let rejections = stops.len();
    let type_i_error_rate = rejections as f64 / options.runs as f64;
    debug!(
        runs = options.runs,
        rejections,
        type_i_error_rate,
        null_rate = rate,
        "msprt type-I simulation complete"
    );
    Ok(TypeIErrorSimulationResult {
        runs: options.runs,
        rejections,
        type_i_error_rate,
        threshold_log_e: threshold,
    })
}

/// Estimates power and stopping time for a true difference in rates.
///
/// Uses the same paired-look procedure as [`simulate_type_i_rate`].
///
/// # Errors
///
/// Either rate outside `[0, 1]`, zero `runs` or `max_pairs`, `alpha`
/// outside `(0, 1)`, or non-positive `tau`.
pub fn simulate_power(options: &PowerSimulationOptions) -> Result<PowerSimulationResult> {
    let control_rate = ensure_probability("control_rate", options.control_rate)?;
    let treatment_rate = ensure_probability("treatment_rate", options.treatment_rate)?;
    validate_simulation(options.runs, options.max_pairs, options.alpha, options.tau)?;

    let threshold = -options.alpha.ln();
    let mut stops = PairedRuns {
        control_rate,
        treatment_rate,
        runs: options.runs,
        max_pairs: options.max_pairs,
        threshold,
        tau: options.tau,
        seed: options.seed,
    }
    .stopping_pairs();

    let detections = stops.len();
    let power = detections as f64 / options.runs as f64;
    let mean_stopping_pair = (detections > 0)
        .then(|| stops.iter().map(|&s| s as f64).sum::<f64>() / detections as f64);
    stops.sort_unstable();
    let median_stopping_pair = median(&stops);
    debug!(
        runs = options.runs,
        detections,
        power,
        ?mean_stopping_pair,
        "msprt power simulation complete"
    );

    Ok(PowerSimulationResult {
        runs: options.runs,
        detections,
        power,
        mean_stopping_pair,
        median_stopping_pair,
        threshold_log_e: threshold,
    })
}

/// Median of sorted values.
fn median(sorted: &[u64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2] as f64),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0),
    }
}
