//! Group-sequential stopping boundaries.
//!
//! O'Brien–Fleming-style boundaries for a fixed schedule of interim
//! looks: the per-look critical value is `c_k = z* / √t_k`, where `z*` is
//! the fixed-sample critical value and `t_k` the information fraction at
//! look `k`. Early looks are conservative and the final look at `t = 1`
//! uses `z*` itself.
//!
//! This is an approximation. The boundaries are not solved from an
//! alpha-spending function, so the overall Type-I error is only
//! approximately `alpha`; every result carries [`APPROXIMATION_NOTE`].
//!
//! ## References
//!
//! - O'Brien PC, Fleming TR (1979). A multiple testing procedure for
//!   clinical trials. *Biometrics* 35:549–556.

use serde::{Deserialize, Serialize};

use crate::alternative::Alternative;
use crate::error::{ensure_finite, ensure_open_unit, ExperimentError, Result};

pub const DEFAULT_ALPHA: f64 = 0.05;

/// Caveat attached to every group-sequential result.
pub const APPROXIMATION_NOTE: &str = "O'Brien-Fleming-style approximation (z*/sqrt(t)); \
not a full alpha-spending design, overall Type-I error is approximate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSequentialOptions {
    /// Strictly increasing fractions in `(0, 1]`, one per planned look.
    /// The last entry is the current look.
    pub information_fractions: Vec<f64>,
    pub alpha: f64,
    pub alternative: Alternative,
    /// Observed z-statistic at the current look.
    pub observed_z: f64,
}

impl Default for GroupSequentialOptions {
    fn default() -> Self {
        Self {
            information_fractions: Vec::new(),
            alpha: DEFAULT_ALPHA,
            alternative: Alternative::TwoSided,
            observed_z: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSequentialResult {
    /// Critical value per look, `base_critical_value / √t_k`.
    pub critical_values: Vec<f64>,
    /// Fixed-sample critical value `z*`.
    pub base_critical_value: f64,
    /// Current look, 1-indexed.
    pub current_look: usize,
    pub current_information_fraction: f64,
    pub current_critical_value: f64,
    pub observed_z: f64,
    /// Whether the observed z crosses the current boundary.
    pub can_stop: bool,
    /// Approximate p-value of the information-scaled statistic `z·√t`.
    pub adjusted_p_value: f64,
    pub alternative: Alternative,
    pub note: String,
}

/// Computes boundaries and the stopping decision at the current look.
///
/// # Errors
///
/// Empty or non-increasing `information_fractions`, a fraction outside
/// `(0, 1]`, `alpha` outside `(0, 1)`, or a non-finite `observed_z`.
///
/// # Examples
///
/// ```
/// use u_experiment::sequential::{group_sequential_test, GroupSequentialOptions};
///
/// let r = group_sequential_test(&GroupSequentialOptions {
///     information_fractions: vec![0.5, 0.75, 1.0],
///     ..Default::default()
/// })
/// .unwrap();
/// assert!((r.critical_values[0] - 2.77).abs() < 0.01);
/// assert!((r.critical_values[2] - 1.96).abs() < 0.01);
/// assert!(!r.can_stop);
/// ```
pub fn group_sequential_test(options: &GroupSequentialOptions) -> Result<GroupSequentialResult> {
    let fractions = &options.information_fractions;
    validate_fractions(fractions)?;
    let alpha = ensure_open_unit("alpha", options.alpha)?;
    let z = ensure_finite("observed_z", options.observed_z)?;
    let alternative = options.alternative;

    let base = alternative.normal_critical_value(alpha)?;
    let critical_values: Vec<f64> = fractions.iter().map(|t| base / t.sqrt()).collect();

    let current_look = fractions.len();
    let t_current = fractions[current_look - 1];
    let c_current = critical_values[current_look - 1];

    Ok(GroupSequentialResult {
        can_stop: alternative.rejects(z, c_current),
        adjusted_p_value: alternative.normal_p_value(z * t_current.sqrt()),
        critical_values,
        base_critical_value: base,
        current_look,
        current_information_fraction: t_current,
        current_critical_value: c_current,
        observed_z: z,
        alternative,
        note: APPROXIMATION_NOTE.to_string(),
    })
}

fn validate_fractions(fractions: &[f64]) -> Result<()> {
    const PARAM: &str = "information_fractions";
    if fractions.is_empty() {
        return Err(ExperimentError::invalid(PARAM, "at least one look is required"));
    }
    if let Some(t) = fractions
        .iter()
        .find(|t| t.is_nan() || **t <= 0.0 || **t > 1.0)
    {
        return Err(ExperimentError::invalid(
            PARAM,
            format!("each fraction must lie in (0, 1], got {t}"),
        ));
    }
    if let Some(w) = fractions.windows(2).find(|w| w[1] <= w[0]) {
        return Err(ExperimentError::invalid(
            PARAM,
            format!("must be strictly increasing, got {} then {}", w[0], w[1]),
        ));
    }
    Ok(())
}
