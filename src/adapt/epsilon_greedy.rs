use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{log_spaced_arms, Adapter, AdapterState};
use crate::error::Error;

/// Default exploration rate.
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Default number of arms.
pub const DEFAULT_NUM_ARMS: usize = 100;

/// How far an arm's reward estimate moves toward each new sample.
#[derive(Clone, Copy, Debug)]
pub enum StepRule {
    /// Fixed step size; recent samples dominate the estimate.
    Constant(f64),
    /// `1/n` where `n` is the arm's pull count; the estimate converges to
    /// the sample mean.
    InverseCount,
}

/// ε-greedy multi-armed bandit over a log-spaced parameter grid.
///
/// Each arm holds one candidate parameter.  The grid is log-spaced
/// between `min_param` and `max_param` — the decay rate acts through an
/// exponential, so a linear grid would waste most arms far from the
/// useful regime.
///
/// Per [`call`](Adapter::call): the incoming objective is credited as the
/// reward of the arm chosen last round, that arm's estimate moves by
/// `step · (reward − estimate)`, and the next arm is a uniformly random
/// one with probability ε or the current argmax otherwise.
pub struct EpsilonGreedyAdapter {
    state: AdapterState,

    epsilon: f64,
    step: StepRule,

    arms: Vec<f64>,
    estimates: Vec<f64>,
    pulls: Vec<u64>,
    current_arm: usize,

    rng: StdRng,
}

impl EpsilonGreedyAdapter {
    /// Creates an adapter with a freshly seeded RNG.
    pub fn new(
        min_param: f64,
        max_param: f64,
        num_arms: usize,
        epsilon: f64,
        step: StepRule,
    ) -> Result<Self, Error> {
        Self::build(
            min_param,
            max_param,
            num_arms,
            epsilon,
            step,
            StdRng::from_entropy(),
        )
    }

    /// Creates an adapter with a deterministic RNG.
    pub fn with_seed(
        min_param: f64,
        max_param: f64,
        num_arms: usize,
        epsilon: f64,
        step: StepRule,
        seed: u64,
    ) -> Result<Self, Error> {
        Self::build(
            min_param,
            max_param,
            num_arms,
            epsilon,
            step,
            StdRng::seed_from_u64(seed),
        )
    }

    fn build(
        min_param: f64,
        max_param: f64,
        num_arms: usize,
        epsilon: f64,
        step: StepRule,
        rng: StdRng,
    ) -> Result<Self, Error> {
        let arms = log_spaced_arms(min_param, max_param, num_arms)?;
        Ok(EpsilonGreedyAdapter {
            state: AdapterState::new(),
            epsilon,
            step,
            estimates: vec![0.0; num_arms],
            pulls: vec![0; num_arms],
            current_arm: 0,
            arms,
            rng,
        })
    }

    /// Candidate parameter values, one per arm.
    pub fn arms(&self) -> &[f64] {
        &self.arms
    }

    /// Reward estimates, one per arm.
    pub fn estimates(&self) -> &[f64] {
        &self.estimates
    }

    /// Pull counts, one per arm.
    pub fn pulls(&self) -> &[u64] {
        &self.pulls
    }

    /// Arm selected by the most recent call.
    pub fn current_arm(&self) -> usize {
        self.current_arm
    }

    /// First arm with the highest reward estimate.
    fn best_arm(&self) -> usize {
        let mut best = 0;
        for (arm, &estimate) in self.estimates.iter().enumerate() {
            if estimate > self.estimates[best] {
                best = arm;
            }
        }
        best
    }
}

impl Adapter for EpsilonGreedyAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn disturb(&mut self, _param: f64) -> f64 {
        self.current_arm = self.rng.gen_range(0..self.arms.len());
        self.arms[self.current_arm]
    }

    fn adapt(
        &mut self,
        objective: f64,
        _last_objective: f64,
        _param: f64,
        _last_param: f64,
    ) -> f64 {
        // The objective is the reward for the arm selected last round.
        let reward = objective;

        self.pulls[self.current_arm] += 1;
        let step = match self.step {
            StepRule::Constant(step) => step,
            StepRule::InverseCount => 1.0 / self.pulls[self.current_arm] as f64,
        };
        self.estimates[self.current_arm] += step * (reward - self.estimates[self.current_arm]);

        if self.rng.gen::<f64>() < self.epsilon {
            self.current_arm = self.rng.gen_range(0..self.arms.len());
        } else {
            self.current_arm = self.best_arm();
        }

        self.arms[self.current_arm]
    }
}
