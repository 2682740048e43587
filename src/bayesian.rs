//! Beta-Binomial Bayesian A/B analysis.
//!
//! Each arm's conversion rate gets a conjugate Beta posterior; the
//! comparison quantities (probability that treatment wins, expected
//! lift, expected loss) come from a seeded Monte Carlo over paired
//! posterior draws, so identical options always give identical output.
//!
//! # Examples
//!
//! ```
//! use u_experiment::bayesian::{bayesian_ab_test, BayesianOptions};
//! use u_experiment::observations::ProportionSample;
//!
//! let r = bayesian_ab_test(
//!     ProportionSample::new(50, 1000),
//!     ProportionSample::new(65, 1000),
//!     &BayesianOptions::default(),
//! )
//! .unwrap();
//! assert!(r.probability_treatment_better > 0.85);
//! assert_eq!(r.control.alpha, 50.5);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distributions::{beta_unchecked, Beta};
use crate::error::{ensure_open_unit, ensure_positive, ExperimentError, Result};
use crate::observations::ProportionSample;
use crate::random::SeededRandom;

/// Jeffreys prior Beta(0.5, 0.5).
pub const DEFAULT_PRIOR_ALPHA: f64 = 0.5;
pub const DEFAULT_PRIOR_BETA: f64 = 0.5;
pub const DEFAULT_CREDIBLE_LEVEL: f64 = 0.95;
pub const DEFAULT_SIMULATION_SAMPLES: usize = 10_000;
pub const DEFAULT_SEED: u32 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianOptions {
    pub prior_alpha: f64,
    pub prior_beta: f64,
    pub credible_level: f64,
    /// Number of paired posterior draws; must be at least 1.
    pub simulation_samples: usize,
    pub seed: u32,
}

impl Default for BayesianOptions {
    fn default() -> Self {
        Self {
            prior_alpha: DEFAULT_PRIOR_ALPHA,
            prior_beta: DEFAULT_PRIOR_BETA,
            credible_level: DEFAULT_CREDIBLE_LEVEL,
            simulation_samples: DEFAULT_SIMULATION_SAMPLES,
            seed: DEFAULT_SEED,
        }
    }
}

/// Equal-tailed credible interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

/// Closed-form Beta posterior of one arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummary {
    pub alpha: f64,
    pub beta: f64,
    /// `alpha / (alpha + beta)`.
    pub mean: f64,
    pub credible_interval: CredibleInterval,
}

impl PosteriorSummary {
    fn from_beta(posterior: &Beta, level: f64) -> Result<Self> {
        let tail = (1.0 - level) / 2.0;
        Ok(Self {
            alpha: posterior.alpha(),
            beta: posterior.beta(),
            mean: posterior.mean(),
            credible_interval: CredibleInterval {
                lower: posterior.quantile(tail)?,
                upper: posterior.quantile(1.0 - tail)?,
                level,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianResult {
    pub control: PosteriorSummary,
    pub treatment: PosteriorSummary,
    /// Monte Carlo estimate of P(p_treatment > p_control).
    pub probability_treatment_better: f64,
    /// E[(t − c) / c], averaged over draws with `c > 0`.
    pub expected_relative_lift: f64,
    /// E[t − c].
    pub expected_absolute_lift: f64,
    /// E[max(c − t, 0)]: expected rate lost by shipping treatment.
    pub expected_loss: f64,
    pub simulation_samples: usize,
    pub seed: u32,
}

/// Bayesian comparison of two conversion rates.
///
/// # Algorithm
///
/// 1. Posteriors are exact: `Beta(α₀ + s, β₀ + n − s)` per arm.
/// 2. Credible intervals are equal-tailed Beta quantiles
///    ([`Beta::quantile`]).
/// 3. `simulation_samples` iterations each draw control then treatment
///    from their posteriors with an engine seeded by `seed`, and
///    accumulate the win indicator, relative and absolute lift, and loss.
///
/// # Errors
///
/// `successes > total` for either arm, non-positive or non-finite
/// priors, `credible_level` outside `(0, 1)`, or zero
/// `simulation_samples`.
pub fn bayesian_ab_test(
    control: ProportionSample,
    treatment: ProportionSample,
    options: &BayesianOptions,
) -> Result<BayesianResult> {
    control.validate_counts("control")?;
    treatment.validate_counts("treatment")?;
    let prior_alpha = ensure_positive("prior_alpha", options.prior_alpha)?;
    let prior_beta = ensure_positive("prior_beta", options.prior_beta)?;
    let level = ensure_open_unit("credible_level", options.credible_level)?;
    if options.simulation_samples == 0 {
        return Err(ExperimentError::invalid(
            "simulation_samples",
            "must be at least 1",
        ));
    }

    let posterior = |s: &ProportionSample| {
        Beta::new(
            prior_alpha + s.successes as f64,
            prior_beta + s.failures() as f64,
        )
    };
    let post_c = posterior(&control)?;
    let post_t = posterior(&treatment)?;

    let mut rng = SeededRandom::new(options.seed);
    let mut wins = 0_usize;
    let mut relative_sum = 0.0;
    let mut relative_count = 0_usize;
    let mut absolute_sum = 0.0;
    let mut loss_sum = 0.0;
    for _ in 0..options.simulation_samples {
        let c = beta_unchecked(post_c.alpha(), post_c.beta(), &mut rng);
        let t = beta_unchecked(post_t.alpha(), post_t.beta(), &mut rng);
        if t > c {
            wins += 1;
        }
        if c > 0.0 {
            relative_sum += (t - c) / c;
            relative_count += 1;
        }
        absolute_sum += t - c;
        loss_sum += (c - t).max(0.0);
    }

    let n = options.simulation_samples as f64;
    let probability_treatment_better = wins as f64 / n;
    let expected_relative_lift = if relative_count > 0 {
        relative_sum / relative_count as f64
    } else {
        0.0
    };
    debug!(
        samples = options.simulation_samples,
        seed = options.seed,
        probability_treatment_better,
        expected_relative_lift,
        "bayesian monte carlo complete"
    );

    Ok(BayesianResult {
        control: PosteriorSummary::from_beta(&post_c, level)?,
        treatment: PosteriorSummary::from_beta(&post_t, level)?,
        probability_treatment_better,
        expected_relative_lift,
        expected_absolute_lift: absolute_sum / n,
        expected_loss: loss_sum / n,
        simulation_samples: options.simulation_samples,
        seed: options.seed,
    })
}
