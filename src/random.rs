//! Seeded random number generation, shuffling, and weighted choice.
//!
//! [`SeededRandom`] is a xoshiro128** generator with 128 bits of state,
//! seeded from a single `u32` through four rounds of the splitmix32
//! avalanche step so that neighbouring seeds start from unrelated states.
//!
//! Reference: Blackman & Vigna (2021), "Scrambled Linear Pseudorandom
//! Number Generators", *ACM TOMS* 47(4).
//!
//! # Reproducibility
//!
//! Identical seeds produce identical sequences on every platform: the
//! generator uses only 32-bit wrapping integer arithmetic. The state can be
//! snapshotted with [`SeededRandom::state`] and restored bit-exactly with
//! [`SeededRandom::from_state`].
//!
//! There is no global or default engine. Every caller owns its handle;
//! independent streams come from distinct seeds or [`SeededRandom::fork`].

use rand::rand_core::impls;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};

const GOLDEN_GAMMA: u32 = 0x9e37_79b9;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
/// FNV-1a 32-bit prime.
pub const FNV_PRIME: u32 = 16_777_619;

/// Plain four-word snapshot of a [`SeededRandom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeededRandomState {
    pub s0: u32,
    pub s1: u32,
    pub s2: u32,
    pub s3: u32,
}

/// Deterministic xoshiro128** generator owned by the caller.
///
/// # Examples
/// ```
/// use u_experiment::random::SeededRandom;
///
/// let mut a = SeededRandom::new(12345);
/// let mut b = SeededRandom::new(12345);
/// assert_eq!(a.next_f64(), b.next_f64());
///
/// let x = a.next_f64();
/// assert!((0.0..1.0).contains(&x));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRandom {
    s0: u32,
    s1: u32,
    s2: u32,
    s3: u32,
}

/// One splitmix32 round.
fn splitmix32(seed: u32) -> u32 {
    let mut s = seed.wrapping_add(GOLDEN_GAMMA);
    s = (s ^ (s >> 16)).wrapping_mul(0x85eb_ca6b);
    s = (s ^ (s >> 13)).wrapping_mul(0xc2b2_ae35);
    s ^ (s >> 16)
}

impl SeededRandom {
    /// Creates a generator from a 32-bit seed.
    pub fn new(seed: u32) -> Self {
        let s0 = splitmix32(seed);
        let s1 = splitmix32(s0);
        let s2 = splitmix32(s1);
        let s3 = splitmix32(s2);
        let mut rng = Self { s0, s1, s2, s3 };
        // The all-zero state is a fixed point of xoshiro.
        if rng.is_zero() {
            rng.s0 = 1;
        }
        rng
    }

    /// Restores a generator from a snapshot taken with [`state`](Self::state).
    ///
    /// # Errors
    /// The all-zero state, which would emit zeros forever.
    pub fn from_state(state: SeededRandomState) -> Result<Self> {
        let rng = Self {
            s0: state.s0,
            s1: state.s1,
            s2: state.s2,
            s3: state.s3,
        };
        if rng.is_zero() {
            return Err(ExperimentError::invalid(
                "state",
                "all-zero state is a fixed point of the generator",
            ));
        }
        Ok(rng)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SeededRandomState {
        SeededRandomState {
            s0: self.s0,
            s1: self.s1,
            s2: self.s2,
            s3: self.s3,
        }
    }

    fn is_zero(&self) -> bool {
        self.s0 == 0 && self.s1 == 0 && self.s2 == 0 && self.s3 == 0
    }

    fn step(&mut self) -> u32 {
        let result = self.s1.wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.s1 << 9;

        self.s2 ^= self.s0;
        self.s3 ^= self.s1;
        self.s1 ^= self.s2;
        self.s0 ^= self.s3;

        self.s2 ^= t;
        self.s3 = self.s3.rotate_left(11);

        result
    }

    /// Next scrambled 32-bit output word.
    pub fn next_u32(&mut self) -> u32 {
        self.step()
    }

    /// Next uniform float in `[0, 1)`, equal to `next_u32() / 2³²`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / TWO_POW_32
    }

    /// Uniform integer in `[min, max]` (both inclusive).
    ///
    /// # Errors
    /// `min > max`.
    pub fn next_int(&mut self, min: i64, max: i64) -> Result<i64> {
        if min > max {
            return Err(ExperimentError::invalid(
                "max",
                format!("must be >= min ({min}), got {max}"),
            ));
        }
        let span = (i128::from(max) - i128::from(min) + 1) as f64;
        let offset = (self.next_f64() * span).floor() as i128;
        Ok((i128::from(min) + offset).min(i128::from(max)) as i64)
    }

    /// Uniform index in `[lo, hi]`; callers guarantee `lo <= hi`.
    pub(crate) fn index_between(&mut self, lo: usize, hi: usize) -> usize {
        let span = (hi - lo + 1) as f64;
        (lo + (self.next_f64() * span).floor() as usize).min(hi)
    }

    /// Uniform float in `[min, max)`.
    pub fn next_float(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// `true` with the given probability.
    pub fn next_bool(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Fisher-Yates (Durstenfeld) in-place shuffle.
    ///
    /// Reference: Knuth (1997), *TAOCP* Vol. 2, §3.4.2, Algorithm P.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let n = items.len();
        if n <= 1 {
            return;
        }
        for i in (1..n).rev() {
            let j = self.index_between(0, i);
            items.swap(i, j);
        }
    }

    /// Shuffled copy of `items`; the input is left untouched.
    pub fn shuffled<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut copy = items.to_vec();
        self.shuffle(&mut copy);
        copy
    }

    /// Draws `n` distinct elements without replacement (partial shuffle).
    ///
    /// # Errors
    /// `n > items.len()`.
    ///
    /// # Examples
    /// ```
    /// use u_experiment::random::SeededRandom;
    /// let mut rng = SeededRandom::new(42);
    /// let picked = rng.sample(&["a", "b", "c", "d", "e"], 3).unwrap();
    /// assert_eq!(picked.len(), 3);
    /// ```
    pub fn sample<T: Clone>(&mut self, items: &[T], n: usize) -> Result<Vec<T>> {
        if n > items.len() {
            return Err(ExperimentError::invalid(
                "n",
                format!("cannot sample {n} items from {}", items.len()),
            ));
        }
        let mut copy = items.to_vec();
        for i in 0..n {
            let j = self.index_between(i, copy.len() - 1);
            copy.swap(i, j);
        }
        copy.truncate(n);
        Ok(copy)
    }

    /// Uniformly chosen element.
    ///
    /// # Errors
    /// Empty `items`.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T> {
        if items.is_empty() {
            return Err(ExperimentError::invalid("items", "cannot choose from an empty slice"));
        }
        let idx = self.index_between(0, items.len() - 1);
        Ok(&items[idx])
    }

    /// Element chosen with probability proportional to its weight.
    ///
    /// Negative weights count as zero.
    ///
    /// # Errors
    /// Empty `items`, `weights.len() != items.len()`, a non-finite weight,
    /// or no positive weight.
    ///
    /// # Examples
    /// ```
    /// use u_experiment::random::SeededRandom;
    /// let mut rng = SeededRandom::new(7);
    /// let pick = rng.weighted_choice(&["never", "always"], &[0.0, 1.0]).unwrap();
    /// assert_eq!(*pick, "always");
    /// ```
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [T], weights: &[f64]) -> Result<&'a T> {
        if items.is_empty() {
            return Err(ExperimentError::invalid("items", "cannot choose from an empty slice"));
        }
        if items.len() != weights.len() {
            return Err(ExperimentError::invalid(
                "weights",
                format!(
                    "length {} does not match items length {}",
                    weights.len(),
                    items.len()
                ),
            ));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite()) {
            return Err(ExperimentError::invalid(
                "weights",
                format!("must be finite, got {w}"),
            ));
        }
        let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
        if total <= 0.0 {
            return Err(ExperimentError::invalid("weights", "total weight must be positive"));
        }

        let mut target = self.next_f64() * total;
        let mut last_positive = 0;
        for (i, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            last_positive = i;
            target -= w;
            if target <= 0.0 {
                return Ok(&items[i]);
            }
        }
        // Rounding can leave a sliver of target after the last weight.
        Ok(&items[last_positive])
    }

    /// Derives an independent child generator seeded from the next raw
    /// output word. The parent advances by exactly one draw.
    pub fn fork(&mut self) -> SeededRandom {
        SeededRandom::new(self.step())
    }
}

impl RngCore for SeededRandom {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

impl SeedableRng for SeededRandom {
    type Seed = [u8; 16];

    /// Uses the 16 bytes directly as four little-endian state words.
    fn from_seed(seed: Self::Seed) -> Self {
        let word = |i: usize| u32::from_le_bytes([seed[i], seed[i + 1], seed[i + 2], seed[i + 3]]);
        let mut rng = Self {
            s0: word(0),
            s1: word(4),
            s2: word(8),
            s3: word(12),
        };
        if rng.is_zero() {
            rng.s0 = 1;
        }
        rng
    }
}

/// Uniform float in `[0, 1)` from any generator, using one 32-bit word.
///
/// For [`SeededRandom`] this is identical to [`SeededRandom::next_f64`].
pub(crate) fn unit_f64<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    f64::from(rng.next_u32()) / TWO_POW_32
}

/// FNV-1a hash of a string, for stable per-entity seeds.
///
/// The hash runs over UTF-16 code units, so a given identifier maps to the
/// same seed as in UTF-16 based callers.
///
/// # Examples
/// ```
/// use u_experiment::random::{hash_seed, SeededRandom};
/// let mut rng = SeededRandom::new(hash_seed("user-123"));
/// let variant = rng.choice(&["A", "B", "C"]).unwrap();
/// let mut again = SeededRandom::new(hash_seed("user-123"));
/// assert_eq!(again.choice(&["A", "B", "C"]).unwrap(), variant);
/// ```
pub fn hash_seed(input: &str) -> u32 {
    input.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Engine used by an operation: freshly seeded, or borrowed from the caller.
pub(crate) enum EngineSlot<'a> {
    Owned(SeededRandom),
    Borrowed(&'a mut SeededRandom),
}

impl<'a> EngineSlot<'a> {
    /// Picks the caller's engine, or seeds a new one.
    ///
    /// # Errors
    /// Both an explicit seed and an explicit engine.
    pub(crate) fn resolve(
        seed: Option<u32>,
        rng: Option<&'a mut SeededRandom>,
        default_seed: u32,
    ) -> Result<Self> {
        match (seed, rng) {
            (Some(_), Some(_)) => Err(ExperimentError::invalid(
                "seed",
                "supply either a seed or an engine, not both",
            )),
            (None, Some(rng)) => Ok(EngineSlot::Borrowed(rng)),
            (seed, None) => Ok(EngineSlot::Owned(SeededRandom::new(
                seed.unwrap_or(default_seed),
            ))),
        }
    }

    pub(crate) fn engine(&mut self) -> &mut SeededRandom {
        match self {
            EngineSlot::Owned(rng) => rng,
            EngineSlot::Borrowed(rng) => &mut **rng,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_expansion_vector() {
        let rng = SeededRandom::new(42);
        assert_eq!(
            rng.state(),
            SeededRandomState {
                s0: 939_911_724,
                s1: 3_612_297_920,
                s2: 3_251_192_044,
                s3: 35_248_278,
            }
        );
    }

    #[test]
    fn test_output_vector() {
        let mut rng = SeededRandom::new(42);
        let words: Vec<u32> = (0..3).map(|_| rng.next_u32()).collect();
        assert_eq!(words, vec![2_014_437_610, 2_536_506_388, 439_704_051]);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededRandom::new(2024);
        let mut b = SeededRandom::new(2024);
        for _ in 0..1000 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn test_neighbouring_seeds_diverge_early() {
        for seed in 0..50_u32 {
            let mut a = SeededRandom::new(seed);
            let mut b = SeededRandom::new(seed + 1);
            let first_a: Vec<u32> = (0..3).map(|_| a.next_u32()).collect();
            let first_b: Vec<u32> = (0..3).map(|_| b.next_u32()).collect();
            assert_ne!(first_a, first_b, "seeds {seed} and {} collide", seed + 1);
        }
    }

    #[test]
    fn test_seed_zero_is_usable() {
        let mut rng = SeededRandom::new(0);
        let values: std::collections::HashSet<u32> = (0..100).map(|_| rng.next_u32()).collect();
        assert!(values.len() > 90);
    }

    #[test]
    fn test_next_f64_range_and_spread() {
        let mut rng = SeededRandom::new(1);
        let mut buckets = [0u32; 10];
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
            buckets[(v * 10.0) as usize] += 1;
        }
        for count in buckets {
            assert!((700..1300).contains(&count), "bucket count {count}");
        }
    }

    #[test]
    fn test_next_int_inclusive() {
        let mut rng = SeededRandom::new(9);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let v = rng.next_int(1, 6).unwrap();
            assert!((1..=6).contains(&v));
            seen.insert(v);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(rng.next_int(5, 5).unwrap(), 5);
        for _ in 0..100 {
            assert!((-10..=-5).contains(&rng.next_int(-10, -5).unwrap()));
        }
        assert!(rng.next_int(3, 2).is_err());
    }

    #[test]
    fn test_next_int_full_range_does_not_overflow() {
        let mut rng = SeededRandom::new(3);
        for _ in 0..100 {
            rng.next_int(i64::MIN, i64::MAX).unwrap();
        }
    }

    #[test]
    fn test_next_float_range() {
        let mut rng = SeededRandom::new(5);
        for _ in 0..1000 {
            let v = rng.next_float(10.0, 20.0);
            assert!((10.0..20.0).contains(&v));
        }
    }

    #[test]
    fn test_next_bool_probability() {
        let mut rng = SeededRandom::new(11);
        let hits = (0..10_000).filter(|_| rng.next_bool(0.8)).count();
        assert!((7500..8500).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn test_shuffle_preserves_elements() {
        let mut v: Vec<u32> = (1..=10).collect();
        let mut rng = SeededRandom::new(123);
        rng.shuffle(&mut v);
        assert_ne!(v, (1..=10).collect::<Vec<_>>());
        v.sort_unstable();
        assert_eq!(v, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_small() {
        let mut rng = SeededRandom::new(0);
        let mut empty: Vec<i32> = vec![];
        rng.shuffle(&mut empty);
        let mut single = vec![42];
        rng.shuffle(&mut single);
        assert_eq!(single, vec![42]);
    }

    #[test]
    fn test_shuffled_leaves_input() {
        let original = vec![1, 2, 3, 4, 5];
        let mut rng = SeededRandom::new(8);
        let mut copy = rng.shuffled(&original);
        assert_eq!(original, vec![1, 2, 3, 4, 5]);
        copy.sort_unstable();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_sample_without_replacement() {
        let items: Vec<u32> = (0..20).collect();
        let mut rng = SeededRandom::new(77);
        let picked = rng.sample(&items, 5).unwrap();
        assert_eq!(picked.len(), 5);
        let unique: std::collections::HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(rng.sample(&items, 0).unwrap().is_empty());
        assert!(rng.sample(&[1, 2, 3], 5).is_err());
    }

    #[test]
    fn test_sample_is_deterministic() {
        let items = ["a", "b", "c", "d", "e", "f"];
        let a = SeededRandom::new(4).sample(&items, 3).unwrap();
        let b = SeededRandom::new(4).sample(&items, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_choice() {
        let mut rng = SeededRandom::new(21);
        let items = ["red", "green", "blue"];
        let mut counts = std::collections::HashMap::new();
        for _ in 0..300 {
            *counts.entry(*rng.choice(&items).unwrap()).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 3);
        let empty: [u8; 0] = [];
        assert!(rng.choice(&empty).is_err());
    }

    #[test]
    fn test_weighted_choice_ratio() {
        let mut rng = SeededRandom::new(42);
        let items = ["common", "rare"];
        let mut common = 0u32;
        for _ in 0..10_000 {
            if *rng.weighted_choice(&items, &[9.0, 1.0]).unwrap() == "common" {
                common += 1;
            }
        }
        let ratio = common as f64 / (10_000 - common) as f64;
        assert!((7.0..11.0).contains(&ratio), "ratio = {ratio}");
    }

    #[test]
    fn test_weighted_choice_negative_weights_count_as_zero() {
        let mut rng = SeededRandom::new(13);
        for _ in 0..200 {
            assert_eq!(*rng.weighted_choice(&["a", "b", "c"], &[-5.0, 1.0, 0.0]).unwrap(), "b");
        }
    }

    #[test]
    fn test_weighted_choice_errors() {
        let mut rng = SeededRandom::new(1);
        let empty: [u8; 0] = [];
        assert_eq!(rng.weighted_choice(&empty, &[]).unwrap_err().parameter(), "items");
        assert_eq!(rng.weighted_choice(&["a", "b"], &[1.0]).unwrap_err().parameter(), "weights");
        assert!(rng.weighted_choice(&["a", "b"], &[0.0, 0.0]).is_err());
        assert!(rng.weighted_choice(&["a", "b"], &[f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_fork_is_independent_and_deterministic() {
        let mut parent = SeededRandom::new(42);
        let mut child = parent.fork();
        let parent_seq: Vec<u32> = (0..10).map(|_| parent.next_u32()).collect();
        let child_seq: Vec<u32> = (0..10).map(|_| child.next_u32()).collect();
        assert_ne!(parent_seq, child_seq);

        let mut parent2 = SeededRandom::new(42);
        let mut child2 = parent2.fork();
        let child_seq2: Vec<u32> = (0..10).map(|_| child2.next_u32()).collect();
        assert_eq!(child_seq, child_seq2);
    }

    #[test]
    fn test_fork_uses_one_raw_output() {
        let mut a = SeededRandom::new(99);
        let mut b = SeededRandom::new(99);
        let word = b.next_u32();
        assert_eq!(a.fork(), SeededRandom::new(word));
        assert_eq!(a, b);
    }

    #[test]
    fn test_state_roundtrip_through_json() {
        let mut rng = SeededRandom::new(31337);
        for _ in 0..17 {
            rng.next_u32();
        }
        let json = serde_json::to_string(&rng.state()).unwrap();
        let state: SeededRandomState = serde_json::from_str(&json).unwrap();
        let mut restored = SeededRandom::from_state(state).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u32(), restored.next_u32());
        }
    }

    #[test]
    fn test_zero_state_rejected() {
        let zero = SeededRandomState { s0: 0, s1: 0, s2: 0, s3: 0 };
        assert_eq!(SeededRandom::from_state(zero).unwrap_err().parameter(), "state");
        let mut rng = SeededRandom::from_seed([0u8; 16]);
        assert_ne!(rng.next_u32(), rng.next_u32());
    }

    #[test]
    fn test_rng_core_matches_inherent() {
        let mut a = SeededRandom::new(6);
        let mut b = SeededRandom::new(6);
        assert_eq!(RngCore::next_u32(&mut a), b.next_u32());
        let lo = u64::from(b.next_u32());
        let hi = u64::from(b.next_u32());
        assert_eq!(RngCore::next_u64(&mut a), (hi << 32) | lo);
        assert_eq!(unit_f64(&mut a), b.next_f64());
    }

    #[test]
    fn test_hash_seed_vectors() {
        assert_eq!(hash_seed(""), FNV_OFFSET_BASIS);
        assert_eq!(hash_seed("a"), 0xe40c_292c);
        assert_eq!(hash_seed("foobar"), 0xbf9c_f968);
        assert_eq!(hash_seed("user-123"), hash_seed("user-123"));
        assert_ne!(hash_seed("user-123"), hash_seed("user-124"));
    }

    #[test]
    fn test_engine_slot_resolution() {
        let mut mine = SeededRandom::new(5);
        assert!(EngineSlot::resolve(Some(1), Some(&mut mine), 42).is_err());

        let mut slot = EngineSlot::resolve(None, None, 42).unwrap();
        assert_eq!(*slot.engine(), SeededRandom::new(42));

        let mut slot = EngineSlot::resolve(Some(3), None, 42).unwrap();
        assert_eq!(*slot.engine(), SeededRandom::new(3));

        let expected = SeededRandom::new(5).next_u32();
        let mut slot = EngineSlot::resolve(None, Some(&mut mine), 42).unwrap();
        slot.engine().next_u32();
        drop(slot);
        assert_ne!(mine, SeededRandom::new(5));
        let mut fresh = SeededRandom::new(5);
        assert_eq!(fresh.next_u32(), expected);
    }
}
