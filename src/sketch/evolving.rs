use std::marker::PhantomData;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::adapt::Adapter;
use crate::buffer::AlignedBuf;
use crate::error::Error;
use crate::hash::{alt_index, SketchKey, DEFAULT_SEED};
use crate::timing::OpTimer;

use super::{width_for, Sketch, DEPTH};

/// Largest value a counter may reach before single-precision addition
/// starts dropping increments (2²⁴ − 1).
pub const PRUNE_THRESHOLD: f32 = 16_777_215.0;

/// Configuration for an [`EvolvingSketch`].
pub struct EvolvingSketchOptions<F> {
    /// Weight of the event at virtual time `t` under decay rate `alpha`.
    /// Must be deterministic, total, and finite-valued.
    pub f: F,
    /// Starting decay rate.
    pub initial_alpha: f64,
    /// Online optimizer for the decay rate; `None` disables adaptation.
    pub adapter: Option<Box<dyn Adapter>>,
    /// Updates between adaptation rounds; 0 disables adaptation.
    pub adapt_interval: u32,
}

/// A Count-Min sketch whose counters grow by a time-dependent weight
/// `f(t, α)` instead of 1, with online self-tuning of the decay rate α.
///
/// ## Counters
///
/// Four rows of `W` single-precision counters (`W` = smallest power of
/// two ≥ `max(size / 4, 8)`).  Each update adds `f(t, α)` to one counter
/// per row; each estimate reads the same four counters, divides by the
/// current envelope `f(t, α)` and takes the minimum.  The division makes
/// estimates comparable across different α: their unit is *events per
/// unit weight*, not raw accumulated weight.
///
/// ## Prune
///
/// `f(t, α)` typically grows exponentially in `t`, so counters eventually
/// approach the range where `f32` addition loses increments.  An update
/// that would push any counter past [`PRUNE_THRESHOLD`] is rolled back;
/// the whole matrix is then divided by the current envelope, `t` resets
/// to 0, and the update retries at the new scale.  The rollback keeps the
/// update atomic: an observer never sees a half-applied increment.
///
/// ## Adaptation
///
/// The driver accumulates a reward signal (hit count, DCG gain) in the
/// public [`sum`](Self::sum) field.  Every `adapt_interval` updates the
/// sketch prunes, hands `sum / adapt_interval` to the configured
/// [`Adapter`] and replaces α with whatever the adapter returns.
pub struct EvolvingSketch<K, F> {
    width: usize,
    counters: AlignedBuf<f32>,
    seeds: [u64; DEPTH],

    t: u32,
    alpha: f64,
    f: F,

    adapter: Option<Box<dyn Adapter>>,
    adapt_interval: u32,
    adapt_counter: u32,

    /// Reward accumulated by the driver since the last adaptation round.
    /// Zeroed inside `adapt`.
    pub sum: f64,

    update_timer: OpTimer,
    estimate_timer: OpTimer,

    _key: PhantomData<K>,
}

impl<K, F> EvolvingSketch<K, F>
where
    K: SketchKey,
    F: Fn(u32, f64) -> f32,
{
    /// Creates a sketch sized for roughly `size` distinct hot keys.
    ///
    /// Row seeds are drawn from a fresh RNG; use [`with_rng`] when they
    /// need to be reproducible.
    ///
    /// [`with_rng`]: Self::with_rng
    pub fn new(size: usize, options: EvolvingSketchOptions<F>) -> Result<Self, Error> {
        Self::with_rng(size, options, &mut StdRng::from_entropy())
    }

    /// Creates a sketch drawing its row seeds from `rng`.
    pub fn with_rng(
        size: usize,
        options: EvolvingSketchOptions<F>,
        rng: &mut impl Rng,
    ) -> Result<Self, Error> {
        let width = width_for(size);
        let counters = AlignedBuf::zeroed(DEPTH * width)?;
        let mut seeds = [0u64; DEPTH];
        for seed in &mut seeds {
            *seed = rng.gen();
        }
        Ok(EvolvingSketch {
            width,
            counters,
            seeds,
            t: 0,
            alpha: options.initial_alpha,
            f: options.f,
            adapter: options.adapter,
            adapt_interval: options.adapt_interval,
            adapt_counter: 0,
            sum: 0.0,
            update_timer: OpTimer::new(),
            estimate_timer: OpTimer::new(),
            _key: PhantomData,
        })
    }

    /// Current decay rate.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Current virtual time; resets to 0 on every prune.
    pub fn virtual_time(&self) -> u32 {
        self.t
    }

    /// Number of counters per row.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn adapter(&self) -> Option<&dyn Adapter> {
        self.adapter.as_deref()
    }

    pub fn adapter_mut(&mut self) -> Option<&mut dyn Adapter> {
        match &mut self.adapter {
            Some(adapter) => Some(adapter.as_mut()),
            None => None,
        }
    }

    /// Row-major counter positions for `key`, one per row.
    #[inline]
    fn positions(&self, key: &K) -> [usize; DEPTH] {
        let mut index = (key.hash64(DEFAULT_SEED) % self.width as u64) as usize;
        let mut pos = [0usize; DEPTH];
        for (row, slot) in pos.iter_mut().enumerate() {
            if row > 0 {
                index = alt_index(index, self.seeds[row], self.width);
            }
            *slot = row * self.width + index;
        }
        pos
    }

    /// Rescales every counter by the current envelope and resets the clock.
    ///
    /// Counters scale linearly with the envelope, so a uniform scale-down
    /// preserves every ratio the query-time division produces.
    fn prune(&mut self) {
        let d = (self.f)(self.t, self.alpha);
        for counter in self.counters.iter_mut() {
            *counter /= d;
        }
        self.t = 0;
    }

    /// Prunes, then lets the adapter revise α from the accumulated reward.
    fn adapt(&mut self) {
        self.prune();
        if let Some(adapter) = self.adapter.as_deref_mut() {
            let reward = self.sum / f64::from(self.adapt_interval);
            self.sum = 0.0;
            self.alpha = adapter.call(reward, self.alpha);
        }
        self.adapt_counter = 0;
    }
}

impl<K, F> Sketch<K> for EvolvingSketch<K, F>
where
    K: SketchKey,
    F: Fn(u32, f64) -> f32,
{
    type Freq = f32;

    fn update(&mut self, key: &K) {
        let started = Instant::now();
        let pos = self.positions(key);

        // An increment that would push any counter past the precision
        // threshold is rolled back in full, the matrix is pruned, and the
        // update retries at the post-prune scale.
        loop {
            let weight = (self.f)(self.t + 1, self.alpha);
            let mut overflowed = false;
            for (row, &p) in pos.iter().enumerate() {
                if self.counters[p] > PRUNE_THRESHOLD - weight {
                    for &q in &pos[..row] {
                        self.counters[q] -= weight;
                    }
                    overflowed = true;
                    break;
                }
                self.counters[p] += weight;
            }
            if !overflowed {
                break;
            }
            self.prune();
        }
        self.t += 1;

        if self.adapt_interval > 0 {
            self.adapt_counter += 1;
            if self.adapt_counter >= self.adapt_interval {
                self.adapt();
            }
        }

        self.update_timer.record(started);
    }

    fn estimate(&self, key: &K) -> f32 {
        let started = Instant::now();
        let envelope = (self.f)(self.t, self.alpha);
        let mut result = f32::MAX;
        for &p in &self.positions(key) {
            result = result.min(self.counters[p] / envelope);
        }
        self.estimate_timer.record(started);
        result
    }

    fn update_time_avg_seconds(&self) -> f64 {
        self.update_timer.avg_seconds()
    }

    fn estimate_time_avg_seconds(&self) -> f64 {
        self.estimate_timer.avg_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(_t: u32, _alpha: f64) -> f32 {
        1.0
    }

    fn exp_decay(t: u32, alpha: f64) -> f32 {
        (alpha * f64::from(t) / 10_000.0).exp() as f32
    }

    fn make(size: usize, alpha: f64) -> EvolvingSketch<u64, fn(u32, f64) -> f32> {
        let options = EvolvingSketchOptions {
            f: exp_decay as fn(u32, f64) -> f32,
            initial_alpha: alpha,
            adapter: None,
            adapt_interval: 0,
        };
        EvolvingSketch::with_rng(size, options, &mut StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn unseen_key_estimates_zero() {
        let sketch = make(32, 0.0);
        assert_eq!(sketch.estimate(&0xDEAD_BEEFu64), 0.0);
    }

    #[test]
    fn estimates_are_non_negative_and_grow() {
        let mut sketch = make(32, 1.0);
        let mut last = 0.0f32;
        for _ in 0..100 {
            sketch.update(&7u64);
            let estimate = sketch.estimate(&7u64);
            assert!(estimate >= 0.0);
            assert!(estimate >= last, "estimate shrank between updates");
            last = estimate;
        }
    }

    #[test]
    fn flat_weight_counts_updates() {
        let options = EvolvingSketchOptions {
            f: flat as fn(u32, f64) -> f32,
            initial_alpha: 0.0,
            adapter: None,
            adapt_interval: 0,
        };
        let mut sketch: EvolvingSketch<u64, _> =
            EvolvingSketch::with_rng(32, options, &mut StdRng::seed_from_u64(3)).unwrap();
        for _ in 0..9 {
            sketch.update(&42u64);
        }
        // With f ≡ 1 the estimate is an ordinary Count-Min count.
        assert!(sketch.estimate(&42u64) >= 9.0);
    }

    #[test]
    fn virtual_time_advances_per_update() {
        let mut sketch = make(32, 0.5);
        for expected in 1..=10u32 {
            sketch.update(&1u64);
            assert_eq!(sketch.virtual_time(), expected);
        }
    }

    #[test]
    fn prune_is_idempotent_on_a_zeroed_sketch() {
        let mut sketch = make(32, 2.0);
        sketch.prune();
        let after_first: Vec<f32> = sketch.counters.to_vec();
        sketch.prune();
        assert_eq!(after_first, sketch.counters.to_vec());
        assert_eq!(sketch.virtual_time(), 0);
        assert!(sketch.counters.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn prune_preserves_counter_ratios() {
        let mut sketch = make(32, 5.0);
        for _ in 0..100 {
            sketch.update(&1u64);
        }
        for _ in 0..50 {
            sketch.update(&2u64);
        }
        let before_1 = sketch.estimate(&1u64);
        let before_2 = sketch.estimate(&2u64);
        sketch.prune();
        let after_1 = sketch.estimate(&1u64);
        let after_2 = sketch.estimate(&2u64);
        assert!((before_1 / before_2 - after_1 / after_2).abs() / (before_1 / before_2) < 1e-3);
    }

    #[test]
    fn overflow_triggers_prune_and_update_survives() {
        // α = 5 ⟹ f(t) = exp(t / 2000); the running sum on one key crosses
        // the threshold after roughly 18 000 updates.
        let mut sketch = make(8, 5.0);
        let updates = 20_000u32;
        for _ in 0..updates {
            sketch.update(&99u64);
        }
        assert!(
            sketch.virtual_time() < updates,
            "the clock should have been reset by at least one prune"
        );
        assert!(sketch.counters.iter().all(|&c| c <= PRUNE_THRESHOLD));
        assert!(sketch.counters.iter().all(|&c| c >= 0.0));
        assert!(sketch.estimate(&99u64) > 0.0);
    }

    #[test]
    fn sum_is_writable_and_survives_updates_without_adapter() {
        let mut sketch = make(32, 1.0);
        sketch.sum += 5.0;
        sketch.update(&1u64);
        assert_eq!(sketch.sum, 5.0);
    }
}
