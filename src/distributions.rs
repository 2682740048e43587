//! Random variate samplers and the Beta distribution.
//!
//! Every sampler takes its uniform source as a `&mut R` where
//! `R: RngCore`. Pass a [`SeededRandom`](crate::random::SeededRandom) for
//! reproducible streams, or any other `rand` generator. Uniforms are drawn
//! one 32-bit word at a time, so a `SeededRandom` source consumes exactly
//! the same words as its own `next_f64`.
//!
//! # Supported samplers
//!
//! | Sampler | Method |
//! |---|---|
//! | [`normal_sample`] | Box–Muller (cosine branch) |
//! | [`exponential_sample`] | Inverse CDF |
//! | [`poisson_sample`] | Product method for λ ≤ 30, rounded normal above |
//! | [`uniform_sample`] | Affine transform |
//! | [`gamma_sample`] | Marsaglia–Tsang, boosted for shape < 1 |
//! | [`beta_sample`] | Ratio of two gamma variates |

use std::f64::consts::PI;

use rand::RngCore;
use serde::Serialize;

use crate::error::{
    ensure_finite, ensure_non_negative, ensure_positive, ensure_probability, ExperimentError, Result,
};
use crate::random::unit_f64;
use crate::special;

/// λ above which [`poisson_sample`] switches to the normal approximation.
pub const POISSON_NORMAL_THRESHOLD: f64 = 30.0;

/// Bisection budget for [`Beta::quantile`].
pub const BETA_QUANTILE_MAX_ITER: usize = 120;
/// Bisection tolerance for [`Beta::quantile`].
pub const BETA_QUANTILE_TOLERANCE: f64 = 1e-10;

// ============================================================================
// Samplers
// ============================================================================

/// Uniform draw in `(0, 1)`, rejecting exact zeros.
fn positive_unit<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u = unit_f64(rng);
        if u > 0.0 {
            return u;
        }
    }
}

pub(crate) fn standard_normal<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    // A zero first draw would put log(0) in the radius.
    let u1 = positive_unit(rng);
    let u2 = unit_f64(rng);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Normal variate N(mean, std_dev²) via the Box–Muller transform.
///
/// # Errors
/// Non-finite `mean`, or `std_dev` negative or non-finite.
///
/// # Examples
/// ```
/// use u_experiment::distributions::normal_sample;
/// use u_experiment::random::SeededRandom;
///
/// let mut rng = SeededRandom::new(42);
/// let height = normal_sample(170.0, 10.0, &mut rng).unwrap();
/// assert!(height.is_finite());
/// ```
pub fn normal_sample<R: RngCore + ?Sized>(mean: f64, std_dev: f64, rng: &mut R) -> Result<f64> {
    ensure_finite("mean", mean)?;
    ensure_non_negative("std_dev", std_dev)?;
    Ok(mean + std_dev * standard_normal(rng))
}

/// Exponential variate with the given rate (mean `1 / rate`).
///
/// # Errors
/// `rate` not finite and positive.
pub fn exponential_sample<R: RngCore + ?Sized>(rate: f64, rng: &mut R) -> Result<f64> {
    ensure_positive("rate", rate)?;
    Ok(-positive_unit(rng).ln() / rate)
}

/// Poisson variate with mean `lambda`.
///
/// # Algorithm
/// For λ ≤ [`POISSON_NORMAL_THRESHOLD`], Knuth's product-of-uniforms
/// method. Above it, a normal approximation N(λ, λ) rounded to the nearest
/// integer and floored at zero.
///
/// # Errors
/// `lambda` not finite and positive.
pub fn poisson_sample<R: RngCore + ?Sized>(lambda: f64, rng: &mut R) -> Result<u64> {
    ensure_positive("lambda", lambda)?;
    if lambda > POISSON_NORMAL_THRESHOLD {
        let draw = lambda + lambda.sqrt() * standard_normal(rng);
        return Ok(draw.round().max(0.0) as u64);
    }
    let limit = (-lambda).exp();
    let mut k = 0_u64;
    let mut p = 1.0;
    loop {
        k += 1;
        p *= unit_f64(rng);
        if p <= limit {
            return Ok(k - 1);
        }
    }
}

/// Uniform variate in `[min, max)`.
///
/// # Errors
/// Non-finite bounds, or `min > max`.
pub fn uniform_sample<R: RngCore + ?Sized>(min: f64, max: f64, rng: &mut R) -> Result<f64> {
    ensure_finite("min", min)?;
    ensure_finite("max", max)?;
    if min > max {
        return Err(ExperimentError::invalid(
            "max",
            format!("must be >= min ({min}), got {max}"),
        ));
    }
    Ok(min + unit_f64(rng) * (max - min))
}

/// Gamma variate with the given shape and unit scale.
///
/// # Algorithm
/// Marsaglia & Tsang (2000) squeeze/rejection for shape ≥ 1. For
/// shape < 1 a Gamma(shape + 1) draw is boosted by `U^(1/shape)`.
///
/// Reference: Marsaglia & Tsang (2000), "A Simple Method for Generating
/// Gamma Variables", *ACM TOMS* 26(3).
///
/// # Errors
/// `shape` not finite and positive.
pub fn gamma_sample<R: RngCore + ?Sized>(shape: f64, rng: &mut R) -> Result<f64> {
    ensure_positive("shape", shape)?;
    Ok(gamma_unchecked(shape, rng))
}

pub(crate) fn gamma_unchecked<R: RngCore + ?Sized>(shape: f64, rng: &mut R) -> f64 {
    if shape < 1.0 {
        let boosted = gamma_unchecked(shape + 1.0, rng);
        return boosted * positive_unit(rng).powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = standard_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = unit_f64(rng);
        let x2 = x * x;
        if u < 1.0 - 0.0331 * x2 * x2 {
            return d * v;
        }
        if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Beta(alpha, beta) variate as `X / (X + Y)` with independent
/// `X ~ Gamma(alpha)` and `Y ~ Gamma(beta)`.
///
/// # Errors
/// `alpha` or `beta` not finite and positive.
pub fn beta_sample<R: RngCore + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> Result<f64> {
    ensure_positive("alpha", alpha)?;
    ensure_positive("beta", beta)?;
    Ok(beta_unchecked(alpha, beta, rng))
}

pub(crate) fn beta_unchecked<R: RngCore + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> f64 {
    loop {
        let x = gamma_unchecked(alpha, rng);
        let y = gamma_unchecked(beta, rng);
        let sum = x + y;
        // Both draws can underflow to zero for very small shapes.
        if sum > 0.0 {
            return x / sum;
        }
    }
}

// ============================================================================
// Beta Distribution
// ============================================================================

/// Beta distribution on `[0, 1]`.
///
/// # Mathematical Definition
/// - CDF: I_x(α, β) (regularized incomplete beta)
/// - Mean: α / (α + β)
/// - Variance: αβ / ((α+β)²(α+β+1))
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Beta {
    alpha: f64,
    beta: f64,
}

impl Beta {
    /// Creates a Beta(α, β) distribution.
    ///
    /// # Errors
    /// `alpha` or `beta` not finite and positive.
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        ensure_positive("alpha", alpha)?;
        ensure_positive("beta", beta)?;
        Ok(Self { alpha, beta })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let total = self.alpha + self.beta;
        self.alpha * self.beta / (total * total * (total + 1.0))
    }

    /// CDF: I_x(α, β), with `x` clamped to `[0, 1]`.
    pub fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        special::inc_beta_unchecked(x.clamp(0.0, 1.0), self.alpha, self.beta)
    }

    /// Inverse CDF by bisection on [`cdf`](Self::cdf).
    ///
    /// Runs at most [`BETA_QUANTILE_MAX_ITER`] halvings of `[0, 1]` and
    /// stops once the bracket is narrower than
    /// [`BETA_QUANTILE_TOLERANCE`].
    ///
    /// # Errors
    /// `p` outside `[0, 1]`.
    ///
    /// # Examples
    /// ```
    /// use u_experiment::distributions::Beta;
    /// let beta = Beta::new(2.0, 2.0).unwrap();
    /// assert!((beta.quantile(0.5).unwrap() - 0.5).abs() < 1e-9);
    /// ```
    pub fn quantile(&self, p: f64) -> Result<f64> {
        ensure_probability("p", p)?;
        if p == 0.0 {
            return Ok(0.0);
        }
        if p == 1.0 {
            return Ok(1.0);
        }
        Ok(special::bisect(
            0.0,
            1.0,
            BETA_QUANTILE_MAX_ITER,
            BETA_QUANTILE_TOLERANCE,
            |mid| self.cdf(mid) < p,
        ))
    }

    /// Draws one variate.
    pub fn sample<R: RngCore + ?Sized>(&self, rng: &mut R) -> f64 {
        beta_unchecked(self.alpha, self.beta, rng)
    }
}

// ============================================================================
// Tests
// ============================================================================
