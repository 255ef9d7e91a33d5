use std::marker::PhantomData;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::AlignedBuf;
use crate::error::Error;
use crate::hash::{alt_index, SketchKey, DEFAULT_SEED};
use crate::timing::OpTimer;

use super::{width_for, Sketch, DEPTH};

/// Configuration for an [`AdaSketch`].
pub struct AdaSketchOptions<F> {
    /// Weight of the event at virtual time `t`.  The decay rate is baked
    /// into the closure and never changes.
    pub f: F,
    /// Updates between counter rescales; 0 disables rescaling.
    pub tune_interval: u32,
}

/// Time-decayed Count-Min sketch with a fixed decay rate.
///
/// Every update adds `f(t)` to the touched counters and every estimate
/// divides by the current `f(t)`, exactly like [`EvolvingSketch`] — but
/// the decay rate is frozen at construction and there is no overflow
/// detection, only an optional periodic rescale.
///
/// [`EvolvingSketch`]: super::EvolvingSketch
pub struct AdaSketch<K, F> {
    width: usize,
    counters: AlignedBuf<f32>,
    seeds: [u64; DEPTH],

    t: u32,
    f: F,

    tune_interval: u32,
    tune_counter: u32,

    update_timer: OpTimer,
    estimate_timer: OpTimer,

    _key: PhantomData<K>,
}

impl<K, F> AdaSketch<K, F>
where
    K: SketchKey,
    F: Fn(u32) -> f32,
{
    /// Creates a sketch sized for roughly `size` distinct hot keys.
    pub fn new(size: usize, options: AdaSketchOptions<F>) -> Result<Self, Error> {
        Self::with_rng(size, options, &mut StdRng::from_entropy())
    }

    /// Creates a sketch drawing its row seeds from `rng`.
    pub fn with_rng(
        size: usize,
        options: AdaSketchOptions<F>,
        rng: &mut impl Rng,
    ) -> Result<Self, Error> {
        let width = width_for(size);
        let counters = AlignedBuf::zeroed(DEPTH * width)?;
        let mut seeds = [0u64; DEPTH];
        for seed in &mut seeds {
            *seed = rng.gen();
        }
        Ok(AdaSketch {
            width,
            counters,
            seeds,
            t: 0,
            f: options.f,
            tune_interval: options.tune_interval,
            tune_counter: 0,
            update_timer: OpTimer::new(),
            estimate_timer: OpTimer::new(),
            _key: PhantomData,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn virtual_time(&self) -> u32 {
        self.t
    }

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
    fn tune(&mut self) {
        let d = (self.f)(self.t);
        for counter in self.counters.iter_mut() {
            *counter /= d;
        }
        self.t = 0;
        self.tune_counter = 0;
    }
}

impl<K, F> Sketch<K> for AdaSketch<K, F>
where
    K: SketchKey,
    F: Fn(u32) -> f32,
{
    type Freq = f32;

    fn update(&mut self, key: &K) {
        let started = Instant::now();
        let weight = (self.f)(self.t + 1);
        for &p in &self.positions(key) {
            self.counters[p] += weight;
        }
        self.t += 1;

        if self.tune_interval > 0 {
            self.tune_counter += 1;
            if self.tune_counter >= self.tune_interval {
                self.tune();
            }
        }

        self.update_timer.record(started);
    }

    fn estimate(&self, key: &K) -> f32 {
        let started = Instant::now();
        let envelope = (self.f)(self.t);
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
