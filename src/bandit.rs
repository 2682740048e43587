//! Thompson-sampling allocation over Bernoulli arms.
//!
//! Each arm keeps a Beta posterior over its success rate. Selection draws
//! one value per posterior and plays the largest; the observed reward
//! then updates only the chosen arm.
//!
//! # Examples
//!
//! ```
//! use u_experiment::bandit::{simulate_thompson, ThompsonSimulationOptions};
//!
//! let r = simulate_thompson(ThompsonSimulationOptions {
//!     true_rates: vec![0.05, 0.5],
//!     trials: 500,
//!     seed: Some(1),
//!     ..Default::default()
//! })
//! .unwrap();
//! assert!(r.selection_counts[1] > r.selection_counts[0]);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distributions::beta_unchecked;
use crate::error::{ensure_positive, ensure_probability, ExperimentError, Result};
use crate::random::{EngineSlot, SeededRandom};

pub const DEFAULT_PRIOR_ALPHA: f64 = 1.0;
pub const DEFAULT_PRIOR_BETA: f64 = 1.0;
pub const DEFAULT_SEED: u32 = 42;

/// Beta posterior of one arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaArm {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaArm {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Adds a success or a failure.
    pub fn update(&mut self, reward: bool) {
        if reward {
            self.alpha += 1.0;
        } else {
            self.beta += 1.0;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThompsonSelection {
    /// Index of the arm with the largest draw (first one on ties).
    pub arm: usize,
    /// The posterior draw for every arm, in input order.
    pub samples: Vec<f64>,
}

/// Picks an arm by drawing once from every posterior.
///
/// # Errors
///
/// Empty `arms`, or any shape parameter not finite and positive.
pub fn thompson_select(arms: &[BetaArm], rng: &mut SeededRandom) -> Result<ThompsonSelection> {
    if arms.is_empty() {
        return Err(ExperimentError::invalid("arms", "at least one arm is required"));
    }
    for arm in arms {
        ensure_positive("alpha", arm.alpha)?;
        ensure_positive("beta", arm.beta)?;
    }
    Ok(select_unchecked(arms, rng))
}

fn select_unchecked(arms: &[BetaArm], rng: &mut SeededRandom) -> ThompsonSelection {
    let samples: Vec<f64> = arms
        .iter()
        .map(|a| beta_unchecked(a.alpha, a.beta, rng))
        .collect();
    ThompsonSelection {
        arm: first_max(&samples),
        samples,
    }
}

fn first_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Inputs for [`simulate_thompson`]. Supply at most one of `seed` and
/// `rng`; with neither, the engine is seeded with [`DEFAULT_SEED`].
#[derive(Debug)]
pub struct ThompsonSimulationOptions<'a> {
    pub true_rates: Vec<f64>,
    pub trials: usize,
    pub prior_alpha: f64,
    pub prior_beta: f64,
    pub seed: Option<u32>,
    /// Caller-owned engine, advanced in place.
    pub rng: Option<&'a mut SeededRandom>,
}

impl Default for ThompsonSimulationOptions<'_> {
    fn default() -> Self {
        Self {
            true_rates: Vec::new(),
            trials: 0,
            prior_alpha: DEFAULT_PRIOR_ALPHA,
            prior_beta: DEFAULT_PRIOR_BETA,
            seed: None,
            rng: None,
        }
    }
}

/// One simulated round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThompsonTrial {
    /// 1-indexed.
    pub trial: usize,
    pub arm: usize,
    pub reward: bool,
    pub cumulative_reward: u64,
    /// Sum of `best_rate − rate[arm]` so far.
    pub cumulative_regret: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThompsonSimulationResult {
    pub history: Vec<ThompsonTrial>,
    /// Posterior of every arm after the last trial.
    pub arms: Vec<BetaArm>,
    pub selection_counts: Vec<u64>,
    pub total_reward: u64,
    pub total_regret: f64,
    /// Arm with the highest true rate.
    pub best_arm: usize,
}

/// Runs `trials` rounds of Thompson sampling against known true rates.
///
/// Each round selects an arm, draws a Bernoulli reward at that arm's
/// true rate, updates the chosen posterior, and records cumulative reward
/// and regret. Regret is non-decreasing since every increment is
/// `best_rate − rate[arm] ≥ 0`.
///
/// # Errors
///
/// Empty `true_rates`, a rate outside `[0, 1]`, zero `trials`,
/// non-positive priors, or both `seed` and `rng` supplied.
pub fn simulate_thompson(options: ThompsonSimulationOptions<'_>) -> Result<ThompsonSimulationResult> {
    let ThompsonSimulationOptions {
        true_rates,
        trials,
        prior_alpha,
        prior_beta,
        seed,
        rng,
    } = options;

    if true_rates.is_empty() {
        return Err(ExperimentError::invalid(
            "true_rates",
            "at least one arm is required",
        ));
    }
    for &rate in &true_rates {
        ensure_probability("true_rates", rate)?;
    }
    if trials == 0 {
        return Err(ExperimentError::invalid("trials", "must be at least 1"));
    }
    ensure_positive("prior_alpha", prior_alpha)?;
    ensure_positive("prior_beta", prior_beta)?;
    let mut slot = EngineSlot::resolve(seed, rng, DEFAULT_SEED)?;
    let engine = slot.engine();

    let best_arm = first_max(&true_rates);
    let best_rate = true_rates[best_arm];
    let mut arms = vec![BetaArm::new(prior_alpha, prior_beta); true_rates.len()];
    let mut selection_counts = vec![0_u64; true_rates.len()];
    let mut history = Vec::with_capacity(trials);
    let mut cumulative_reward = 0_u64;
    let mut cumulative_regret = 0.0;

    for trial in 1..=trials {
        let arm = select_unchecked(&arms, engine).arm;
        let reward = engine.next_bool(true_rates[arm]);
        arms[arm].update(reward);
        selection_counts[arm] += 1;
        cumulative_reward += u64::from(reward);
        cumulative_regret += best_rate - true_rates[arm];
        history.push(ThompsonTrial {
            trial,
            arm,
            reward,
            cumulative_reward,
            cumulative_regret,
        });
    }

    debug!(
        trials,
        arms = true_rates.len(),
        total_reward = cumulative_reward,
        total_regret = cumulative_regret,
        "thompson simulation complete"
    );

    Ok(ThompsonSimulationResult {
        history,
        arms,
        selection_counts,
        total_reward: cumulative_reward,
        total_regret: cumulative_regret,
        best_arm,
    })
}
