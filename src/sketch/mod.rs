//! Frequency-estimation sketches.
//!
//! Three variants share the same 4-row Count-Min layout and indexing:
//!
//! | Sketch | Counter | Increment | Self-tuning |
//! |---|---|---|---|
//! | [`CountMinSketch`] | `u32` | `+1` | none |
//! | [`AdaSketch`] | `f32` | `f(t)` | fixed decay, periodic rescale |
//! | [`EvolvingSketch`] | `f32` | `f(t, α)` | prune on overflow + online α adaptation |

mod ada;
mod count_min;
mod evolving;

pub use ada::{AdaSketch, AdaSketchOptions};
pub use count_min::CountMinSketch;
pub use evolving::{EvolvingSketch, EvolvingSketchOptions, PRUNE_THRESHOLD};

use crate::hash::SketchKey;

/// Number of counter rows in every sketch.
pub(crate) const DEPTH: usize = 4;

/// Row width for a capacity hint: the smallest power of two that is at
/// least `max(size / 4, 8)`.
pub(crate) fn width_for(size: usize) -> usize {
    (size / 4).max(8).next_power_of_two()
}

/// Common surface shared by all sketches.
///
/// The W-TinyLFU policy and the benchmark driver are generic over this
/// trait, so any sketch can back the admission decision.
pub trait Sketch<K: SketchKey> {
    /// Estimate type: `u32` for plain counts, `f32` for decayed counts.
    type Freq: PartialOrd + Copy;

    /// Records one occurrence of `key`.
    fn update(&mut self, key: &K);

    /// Approximate frequency of `key`.  Inherits Count-Min's one-sided
    /// error: collisions only ever inflate the result.
    fn estimate(&self, key: &K) -> Self::Freq;

    /// Mean wall time of `update` so far, in seconds.
    fn update_time_avg_seconds(&self) -> f64;

    /// Mean wall time of `estimate` so far, in seconds.
    fn estimate_time_avg_seconds(&self) -> f64;
}
