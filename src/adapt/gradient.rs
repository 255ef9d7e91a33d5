use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Adapter, AdapterState};

/// Default learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;

/// Default gradient clip.
pub const DEFAULT_MAX_GRAD: f64 = 10.0;

/// Default decay rate of the squared-gradient moving average.
pub const DEFAULT_RHO: f64 = 0.5;

/// Default denominator guard for the adaptive learning rate.
pub const DEFAULT_RMS_EPSILON: f64 = 1e-8;

/// Finite-difference gradient descent on the parameter, with an
/// RMSprop-scaled step.
///
/// Estimates `d objective / d parameter` from the two most recent
/// samples, clips it, and steps against it with a learning rate scaled by
/// the running average of squared gradients.  `disturb` nudges the
/// starting parameter by one part in a million so the first finite
/// difference is well defined.
pub struct GradientDescentAdapter {
    state: AdapterState,

    learning_rate: f64,
    max_grad: f64,
    rho: f64,
    rms_epsilon: f64,
    min_param: f64,

    /// Moving average of squared gradients.
    v: f64,

    rng: StdRng,
}

impl GradientDescentAdapter {
    /// Creates an adapter with the default hyper-parameters.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_LEARNING_RATE,
            DEFAULT_MAX_GRAD,
            DEFAULT_RHO,
            DEFAULT_RMS_EPSILON,
            0.0,
        )
    }

    pub fn with_config(
        learning_rate: f64,
        max_grad: f64,
        rho: f64,
        rms_epsilon: f64,
        min_param: f64,
    ) -> Self {
        GradientDescentAdapter {
            state: AdapterState::new(),
            learning_rate,
            max_grad,
            rho,
            rms_epsilon,
            min_param,
            v: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the RNG with a deterministic one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for GradientDescentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for GradientDescentAdapter {
    fn state(&self) -> &AdapterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AdapterState {
        &mut self.state
    }

    fn disturb(&mut self, param: f64) -> f64 {
        let sign = if self.rng.gen::<bool>() { 1.0 } else { -1.0 };
        param * (1.0 + sign * 1e-6)
    }

    fn adapt(&mut self, objective: f64, last_objective: f64, param: f64, last_param: f64) -> f64 {
        // Guard against a zero parameter delta.
        const DELTA_EPS: f64 = 1e-6;

        let grad = ((objective - last_objective) / ((param - last_param) + DELTA_EPS))
            .clamp(-self.max_grad, self.max_grad);

        self.v = self.rho * self.v + (1.0 - self.rho) * grad * grad;
        let adaptive_lr = self.learning_rate / (self.v.sqrt() + self.rms_epsilon);

        (param - adaptive_lr * grad).max(self.min_param)
    }
}
