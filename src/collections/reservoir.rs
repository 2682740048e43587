//! Fixed-size uniform sample of an unbounded stream.
//!
//! # Algorithm
//!
//! Algorithm R: the first `k` items fill the reservoir. The `n`-th item
//! (`n > k`) draws a uniform index `j ∈ [0, n)` and replaces slot `j`
//! when `j < k`, so every item seen so far is retained with probability
//! `k / n`.
//!
//! # References
//!
//! - Vitter (1985), "Random Sampling with a Reservoir", *ACM TOMS* 11(1)

use crate::error::{ExperimentError, Result};
use crate::random::SeededRandom;

/// Reservoir sampler over items of type `T`.
///
/// # Examples
/// ```
/// use u_experiment::collections::ReservoirSampler;
///
/// let mut reservoir = ReservoirSampler::new(3, 42).unwrap();
/// for i in 0..100 {
///     reservoir.push(i);
/// }
/// assert_eq!(reservoir.count(), 100);
/// assert_eq!(reservoir.len(), 3);
/// assert!(reservoir.sample().iter().all(|v| (0..100).contains(v)));
/// ```
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    items: Vec<T>,
    seen: usize,
    rng: SeededRandom,
}

impl<T> ReservoirSampler<T> {
    /// Creates an empty reservoir with its own engine seeded by `seed`.
    ///
    /// # Errors
    /// `capacity == 0`.
    pub fn new(capacity: usize, seed: u32) -> Result<Self> {
        Self::with_rng(capacity, SeededRandom::new(seed))
    }

    /// Creates an empty reservoir driven by `rng`.
    ///
    /// # Errors
    /// `capacity == 0`.
    pub fn with_rng(capacity: usize, rng: SeededRandom) -> Result<Self> {
        if capacity == 0 {
            return Err(ExperimentError::invalid("capacity", "must be at least 1"));
        }
        Ok(Self {
            capacity,
            items: Vec::with_capacity(capacity),
            seen: 0,
            rng,
        })
    }

    /// Offers one item from the stream.
    pub fn push(&mut self, item: T) {
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        let j = self.rng.index_between(0, self.seen - 1);
        if j < self.capacity {
            self.items[j] = item;
        }
    }

    /// Items offered since creation or the last [`reset`](Self::reset).
    pub fn count(&self) -> usize {
        self.seen
    }

    /// Items currently held, at most `capacity`.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empties the reservoir. The engine keeps its position.
    pub fn reset(&mut self) {
        self.items.clear();
        self.seen = 0;
    }
}

impl<T: Clone> ReservoirSampler<T> {
    /// Copy of the current sample.
    pub fn sample(&self) -> Vec<T> {
        self.items.clone()
    }
}
