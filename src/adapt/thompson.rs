use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};

use super::{log_spaced_arms, Adapter, AdapterState};
use crate::error::Error;

/// Default exponent applied to rewards before they enter an arm's window.
pub const DEFAULT_REWARD_SCALING: f64 = 5.0;

/// Default per-arm window size.
pub const DEFAULT_WINDOW_SIZE: usize = 500;

/// Bounded window of an arm's recent rewards with a running sum.
struct ArmWindow {
    rewards: VecDeque<f64>,
    sum: f64,
    cap: usize,
}

impl ArmWindow {
    fn new(cap: usize) -> Self {
        ArmWindow {
            rewards: VecDeque::new(),
            sum: 0.0,
            cap,
        }
    }

    fn push(&mut self, reward: f64) {
        self.rewards.push_back(reward);
        self.sum += reward;
        if self.rewards.len() > self.cap {
            if let Some(oldest) = self.rewards.pop_front() {
                self.sum -= oldest;
            }
        }
    }

    /// Beta posterior `(α, β)` over the window, with a `Beta(1, 1)` prior.
    /// Rewards are assumed in `[0, 1]`: successes are `Σr`, failures
    /// `Σ(1 − r)`.
    fn beta_params(&self) -> (f64, f64) {
        let n = self.rewards.len() as f64;
        (1.0 + self.sum, 1.0 + (n - self.sum))
    }

    fn len(&self) -> usize {
        self.rewards.len()
    }
}

/// Thompson-sampling bandit over a log-spaced parameter grid, with
/// per-arm sliding-window posteriors.
///
/// Each arm keeps at most `window_size` recent rewards, so evidence ages
/// out and the posterior can track a drifting optimum.  Every
/// [`call`](Adapter::call) pushes the (scaled) reward onto the current
/// arm's window, samples each arm's Beta posterior once, and selects the
/// arm with the highest sample.
///
/// Rewards are raised to the power `1 / reward_scaling` before entering
/// the window, sharpening small differences near zero.
pub struct SlidingWindowThompsonAdapter {
    state: AdapterState,

    reward_scaling: f64,

    arms: Vec<f64>,
    windows: Vec<ArmWindow>,
    current_arm: usize,

    rng: StdRng,
}

impl SlidingWindowThompsonAdapter {
    /// Creates an adapter with a freshly seeded RNG.
    pub fn new(
        min_param: f64,
        max_param: f64,
        num_arms: usize,
        reward_scaling: f64,
        window_size: usize,
    ) -> Result<Self, Error> {
        Self::build(
            min_param,
            max_param,
            num_arms,
            reward_scaling,
            window_size,
            StdRng::from_entropy(),
        )
    }

    /// Creates an adapter with a deterministic RNG.
    pub fn with_seed(
        min_param: f64,
        max_param: f64,
        num_arms: usize,
        reward_scaling: f64,
        window_size: usize,
        seed: u64,
    ) -> Result<Self, Error> {
        Self::build(
            min_param,
            max_param,
            num_arms,
            reward_scaling,
            window_size,
            StdRng::seed_from_u64(seed),
        )
    }

    fn build(
        min_param: f64,
        max_param: f64,
        num_arms: usize,
        reward_scaling: f64,
        window_size: usize,
        rng: StdRng,
    ) -> Result<Self, Error> {
        let arms = log_spaced_arms(min_param, max_param, num_arms)?;
        if window_size == 0 {
            return Err(Error::ZeroCapacity);
        }
        let windows = (0..num_arms).map(|_| ArmWindow::new(window_size)).collect();
        Ok(SlidingWindowThompsonAdapter {
            state: AdapterState::new(),
            reward_scaling,
            arms,
            windows,
            current_arm: 0,
            rng,
        })
    }

    /// Candidate parameter values, one per arm.
    pub fn arms(&self) -> &[f64] {
        &self.arms
    }

    /// Arm selected by the most recent call.
    pub fn current_arm(&self) -> usize {
        self.current_arm
    }

    /// Number of rewards currently windowed for `arm`.
    pub fn window_len(&self, arm: usize) -> usize {
        self.windows[arm].len()
    }

    /// Draws from `Beta(α, β)` as `x / (x + y)` with two `Gamma(·, 1)`
    /// draws; falls back to 0.5 on degenerate input.
    fn sample_beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let (Ok(gamma_alpha), Ok(gamma_beta)) = (Gamma::new(alpha, 1.0), Gamma::new(beta, 1.0))
        else {
            return 0.5;
        };
        let x: f64 = gamma_alpha.sample(&mut self.rng);
        let y: f64 = gamma_beta.sample(&mut self.rng);
        if x + y == 0.0 {
            return 0.5;
        }
        x / (x + y)
    }

    /// Samples every arm's posterior once and returns the argmax.
    fn sample_best_arm(&mut self) -> usize {
        let mut best_arm = 0;
        let mut best_sample = -1.0;
        for arm in 0..self.arms.len() {
            let (alpha, beta) = self.windows[arm].beta_params();
            let sample = self.sample_beta(alpha, beta);
            if sample > best_sample {
                best_sample = sample;
                best_arm = arm;
            }
        }
        best_arm
    }
}

impl Adapter for SlidingWindowThompsonAdapter {
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
        let reward = objective.powf(1.0 / self.reward_scaling);
        self.windows[self.current_arm].push(reward);

        self.current_arm = self.sample_best_arm();
        self.arms[self.current_arm]
    }
}
