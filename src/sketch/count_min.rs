use std::marker::PhantomData;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::AlignedBuf;
use crate::error::Error;
use crate::hash::{alt_index, SketchKey, DEFAULT_SEED};
use crate::timing::OpTimer;

use super::{width_for, Sketch, DEPTH};

/// Plain Count-Min sketch: 32-bit counters, increments of 1, no decay.
///
/// The undecayed baseline the time-decayed sketches are measured against;
/// it shares their row layout and indexing exactly.
pub struct CountMinSketch<K> {
    width: usize,
    counters: AlignedBuf<u32>,
    seeds: [u64; DEPTH],

    update_timer: OpTimer,
    estimate_timer: OpTimer,

    _key: PhantomData<K>,
}

impl<K: SketchKey> CountMinSketch<K> {
    /// Creates a sketch sized for roughly `size` distinct hot keys.
    pub fn new(size: usize) -> Result<Self, Error> {
        Self::with_rng(size, &mut StdRng::from_entropy())
    }

    /// Creates a sketch drawing its row seeds from `rng`.
    pub fn with_rng(size: usize, rng: &mut impl Rng) -> Result<Self, Error> {
        let width = width_for(size);
        let counters = AlignedBuf::zeroed(DEPTH * width)?;
        let mut seeds = [0u64; DEPTH];
        for seed in &mut seeds {
            *seed = rng.gen();
        }
        Ok(CountMinSketch {
            width,
            counters,
            seeds,
            update_timer: OpTimer::new(),
            estimate_timer: OpTimer::new(),
            _key: PhantomData,
        })
    }

    pub fn width(&self) -> usize {
        self.width
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
}

impl<K: SketchKey> Sketch<K> for CountMinSketch<K> {
    type Freq = u32;

    fn update(&mut self, key: &K) {
        let started = Instant::now();
        for &p in &self.positions(key) {
            self.counters[p] = self.counters[p].saturating_add(1);
        }
        self.update_timer.record(started);
    }

    fn estimate(&self, key: &K) -> u32 {
        let started = Instant::now();
        let mut result = u32::MAX;
        for &p in &self.positions(key) {
            result = result.min(self.counters[p]);
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
