//! Sample-size planning for two-proportion experiments.

use serde::{Deserialize, Serialize};

use crate::alternative::Alternative;
use crate::error::{ensure_open_unit, ensure_positive, ExperimentError, Result};
use crate::special;

pub const DEFAULT_ALPHA: f64 = 0.05;
pub const DEFAULT_POWER: f64 = 0.8;

/// Planning inputs. `baseline_rate` and `minimum_detectable_effect` have
/// no sensible defaults and are zero until set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleSizeOptions {
    /// Control conversion rate, in `(0, 1)`.
    pub baseline_rate: f64,
    /// Absolute lift to detect; `baseline_rate + effect` must stay in `(0, 1)`.
    pub minimum_detectable_effect: f64,
    pub alpha: f64,
    pub power: f64,
    pub alternative: Alternative,
}

impl Default for SampleSizeOptions {
    fn default() -> Self {
        Self {
            baseline_rate: 0.0,
            minimum_detectable_effect: 0.0,
            alpha: DEFAULT_ALPHA,
            power: DEFAULT_POWER,
            alternative: Alternative::TwoSided,
        }
    }
}

/// Required sample size for a two-proportion experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSizeResult {
    pub samples_per_variant: u64,
    /// Always `2 * samples_per_variant`.
    pub total_samples: u64,
    pub baseline_rate: f64,
    pub target_rate: f64,
    pub minimum_detectable_effect: f64,
    /// Effect relative to the baseline, `effect / baseline_rate`.
    pub relative_effect: f64,
    pub alpha: f64,
    pub power: f64,
    pub alternative: Alternative,
}

/// Samples per variant needed to detect an absolute lift in a rate.
///
/// # Algorithm
///
/// ```text
/// n = ⌈(z_α + z_β)² · [p₁(1 − p₁) + p₂(1 − p₂)] / (p₂ − p₁)²⌉
/// ```
///
/// where `p₂ = p₁ + effect`, `z_β = Φ⁻¹(power)`, and `z_α` is
/// `Φ⁻¹(1 − α/2)` for a two-sided test or `Φ⁻¹(1 − α)` for either
/// one-sided alternative.
///
/// # Errors
///
/// `baseline_rate` or `baseline_rate + minimum_detectable_effect` outside
/// `(0, 1)`, a non-positive effect, or `alpha`/`power` outside `(0, 1)`.
///
/// # Examples
///
/// ```
/// use u_experiment::power::{sample_size_for_proportions, SampleSizeOptions};
///
/// let r = sample_size_for_proportions(&SampleSizeOptions {
///     baseline_rate: 0.05,
///     minimum_detectable_effect: 0.01,
///     ..Default::default()
/// })
/// .unwrap();
/// assert_eq!(r.samples_per_variant, 8155);
/// assert_eq!(r.total_samples, 16310);
/// ```
pub fn sample_size_for_proportions(options: &SampleSizeOptions) -> Result<SampleSizeResult> {
    let p1 = ensure_open_unit("baseline_rate", options.baseline_rate)?;
    let effect = ensure_positive("minimum_detectable_effect", options.minimum_detectable_effect)?;
    let p2 = p1 + effect;
    if p2 >= 1.0 {
        return Err(ExperimentError::invalid(
            "minimum_detectable_effect",
            format!("baseline_rate + effect must be < 1, got {p2}"),
        ));
    }
    let alpha = ensure_open_unit("alpha", options.alpha)?;
    let power = ensure_open_unit("power", options.power)?;

    let z_alpha = options.alternative.normal_critical_value(alpha)?;
    let z_beta = special::normal_ppf(power)?;
    let variance = p1 * (1.0 - p1) + p2 * (1.0 - p2);
    let n = ((z_alpha + z_beta).powi(2) * variance / (effect * effect)).ceil();
    let samples_per_variant = n.max(1.0) as u64;

    Ok(SampleSizeResult {
        samples_per_variant,
        total_samples: 2 * samples_per_variant,
        baseline_rate: p1,
        target_rate: p2,
        minimum_detectable_effect: effect,
        relative_effect: effect / p1,
        alpha,
        power,
        alternative: options.alternative,
    })
}
