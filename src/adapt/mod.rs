//! Online optimizers for the sketch decay rate.
//!
//! An adapter maps a stream of (objective, parameter) samples to the next
//! parameter value.  The first [`call`](Adapter::call) routes to
//! [`disturb`](Adapter::disturb) — pick an exploratory starting point —
//! and every later call routes to [`adapt`](Adapter::adapt).  Adapters
//! can record their `(objective, parameter)` trajectory for offline
//! inspection and save it as CSV.

mod epsilon_greedy;
mod gradient;
mod thompson;

pub use epsilon_greedy::{EpsilonGreedyAdapter, StepRule};
pub use gradient::GradientDescentAdapter;
pub use thompson::SlidingWindowThompsonAdapter;

use std::fs;
use std::path::Path;

use crate::error::Error;

/// Bookkeeping shared by every adapter implementation.
pub struct AdapterState {
    last_objective: f64,
    last_param: f64,
    first_update: bool,
    recording: bool,
    history: Vec<(f64, f64)>,
}

impl AdapterState {
    pub fn new() -> Self {
        AdapterState {
            last_objective: 0.0,
            last_param: 0.0,
            first_update: true,
            recording: false,
            history: Vec::new(),
        }
    }
}

impl Default for AdapterState {
    fn default() -> Self {
        Self::new()
    }
}

/// An online optimizer for a single scalar parameter.
///
/// Implementors provide the two strategy hooks plus access to a shared
/// [`AdapterState`]; `call` and the history machinery are supplied here.
/// Given a fixed RNG seed, implementations are deterministic.
pub trait Adapter {
    fn state(&self) -> &AdapterState;
    fn state_mut(&mut self) -> &mut AdapterState;

    /// Picks an exploratory starting parameter.  Invoked exactly once, by
    /// the first `call`.
    fn disturb(&mut self, param: f64) -> f64;

    /// Maps the newest (objective, parameter) sample and the previous one
    /// to the next parameter.
    fn adapt(&mut self, objective: f64, last_objective: f64, param: f64, last_param: f64) -> f64;

    /// Feeds one objective sample and returns the next parameter value.
    fn call(&mut self, objective: f64, param: f64) -> f64 {
        let new_param = if self.state().first_update {
            self.state_mut().first_update = false;
            self.disturb(param)
        } else {
            let last_objective = self.state().last_objective;
            let last_param = self.state().last_param;
            self.adapt(objective, last_objective, param, last_param)
        };

        let state = self.state_mut();
        if state.recording {
            state.history.push((objective, new_param));
        }
        state.last_objective = objective;
        state.last_param = param;

        new_param
    }

    /// Recorded `(objective, parameter)` pairs, oldest first.
    fn history(&self) -> &[(f64, f64)] {
        &self.state().history
    }

    /// Starts recording, discarding any previously recorded history.
    fn start_recording_history(&mut self) {
        let state = self.state_mut();
        state.recording = true;
        state.history.clear();
    }

    fn stop_recording_history(&mut self) {
        self.state_mut().recording = false;
    }

    /// Writes the recorded history as CSV with an `objective,parameter`
    /// header.  Missing parent directories are created.
    fn save_history(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut out = String::from("objective,parameter\n");
        for &(objective, param) in self.history() {
            out.push_str(&format!("{},{}\n", objective, param));
        }
        fs::write(path, out)?;
        Ok(())
    }
}

/// Log-spaced grid of `num_arms` values between `min_param` and
/// `max_param`, endpoints included.
pub(crate) fn log_spaced_arms(
    min_param: f64,
    max_param: f64,
    num_arms: usize,
) -> Result<Vec<f64>, Error> {
    if !(min_param > 0.0 && max_param > min_param) {
        return Err(Error::InvalidParamRange {
            min: min_param,
            max: max_param,
        });
    }
    if num_arms < 2 {
        return Err(Error::TooFewArms(num_arms));
    }
    let log_min = min_param.ln();
    let log_max = max_param.ln();
    Ok((0..num_arms)
        .map(|i| (log_min + (log_max - log_min) * i as f64 / (num_arms - 1) as f64).exp())
        .collect())
}
