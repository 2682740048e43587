//! # u-experiment
//!
//! Deterministic statistics for planning, analyzing, and sequentially
//! monitoring controlled (A/B) experiments.
//!
//! Callers pass plain numeric records and receive plain, serializable
//! result records. Inputs are validated before any numeric work; invalid
//! inputs fail with an [`ExperimentError`] naming the offending
//! parameter. All randomness flows through an explicit, caller-owned
//! [`SeededRandom`] or an explicit seed, so every result is reproducible.
//!
//! ## Modules
//!
//! - [`special`]: Log-gamma, incomplete gamma/beta, normal, Student-t
//!   and chi-square distribution functions
//! - [`random`]: Seeded xoshiro128** engine and string seed hashing
//! - [`distributions`]: Normal, exponential, Poisson, uniform, gamma
//!   and beta samplers; the [`Beta`](distributions::Beta) distribution
//! - [`collections`]: Reservoir sampling
//! - [`intervals`]: Wilson, Student-t, Newcombe and Welch intervals
//! - [`testing`]: Two-proportion z-test, Welch t-test, chi-square
//!   goodness of fit
//! - [`power`]: Sample-size planning
//! - [`bayesian`]: Beta-Binomial A/B analysis
//! - [`sequential`]: Group-sequential boundaries
//! - [`msprt`]: Always-valid mixture SPRT and its simulation harnesses
//! - [`bandit`]: Thompson sampling
//!
//! ## Design Philosophy
//!
//! - **Determinism**: identical inputs and seeds give identical outputs
//! - **Options structs**: every optional parameter has a named default
//! - **Property-based testing**: mathematical invariants verified via proptest

pub mod alternative;
pub mod bandit;
pub mod bayesian;
pub mod collections;
pub mod distributions;
pub mod error;
pub mod intervals;
pub mod msprt;
pub mod observations;
pub mod power;
pub mod random;
pub mod sequential;
pub mod special;
pub mod testing;

pub use alternative::Alternative;
pub use error::{ExperimentError, Result};
pub use observations::{MeanSample, ProportionSample};
pub use random::{hash_seed, SeededRandom, SeededRandomState};
