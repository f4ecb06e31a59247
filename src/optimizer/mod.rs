//! The stateful optimizer family applied to the five-tensor gradient emitted
//! by a learning algorithm each update step.
//!
//! An [`Optimizer`] is selected from the small tagged [`OptimizerConfig`]
//! catalogue via [`build`]. The tensors here are few, small, and fixed in
//! shape for the run, so an optimizer owns its own momentum buffers
//! directly rather than indexing into a pool keyed by parameter id.
mod momentum;
mod sgd;

pub use momentum::SgdMomentum;
pub use sgd::Sgd;

use crate::error::ConfigError;
use crate::rnn::{Gradients, Rnn};

/// Configuration for one of the optimizer family members, carrying each
/// variant's parameters inline rather than spreading them across a
/// monolithic config struct, since this engine's optimizer surface is
/// deliberately small.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerConfig {
    /// Plain stochastic gradient descent.
    Sgd {
        /// Learning rate.
        lr: f64,
    },
    /// SGD with a momentum term and optional global-norm gradient clipping.
    SgdMomentum {
        /// Learning rate.
        lr: f64,
        /// Momentum coefficient `μ ∈ [0, 1)`.
        mu: f64,
        /// If set, clip the gradient's global L2 norm to this value before
        /// applying the update.
        clip_norm: Option<f64>,
    },
}

impl OptimizerConfig {
    /// Check that rates and coefficients lie in their valid domains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            OptimizerConfig::Sgd { lr } => {
                if !(lr > 0.0) {
                    return Err(ConfigError::InvalidOption {
                        key: "lr".to_owned(),
                        reason: format!("must be positive, got {}", lr),
                    });
                }
            }
            OptimizerConfig::SgdMomentum { lr, mu, clip_norm } => {
                if !(lr > 0.0) {
                    return Err(ConfigError::InvalidOption {
                        key: "lr".to_owned(),
                        reason: format!("must be positive, got {}", lr),
                    });
                }
                if !(0.0..1.0).contains(&mu) {
                    return Err(ConfigError::InvalidOption {
                        key: "mu".to_owned(),
                        reason: format!("must lie in [0, 1), got {}", mu),
                    });
                }
                if let Some(c) = clip_norm {
                    if !(c > 0.0) {
                        return Err(ConfigError::InvalidOption {
                            key: "clip_norm".to_owned(),
                            reason: format!("must be positive, got {}", c),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// A stateful parameter update rule. Applies `grads` to `rnn`'s parameters
/// in place, mutating any internal state (e.g. momentum buffers) it keeps
/// between calls.
pub trait Optimizer {
    /// Apply one update step, mutating `rnn`'s parameters in place.
    fn apply(&mut self, rnn: &mut Rnn, grads: &Gradients);

    /// The learning rate this optimizer was configured with.
    fn learning_rate(&self) -> f64;
}

/// Build the optimizer named by `config`, sized for an RNN of the given
/// dimensions (needed up front by [`SgdMomentum`]'s momentum buffers).
pub fn build(config: OptimizerConfig, n_hidden: usize, n_in: usize, n_out: usize) -> Result<Box<dyn Optimizer>, ConfigError> {
    config.validate()?;
    match config {
        OptimizerConfig::Sgd { lr } => Ok(Box::new(Sgd::new(lr))),
        OptimizerConfig::SgdMomentum { lr, mu, clip_norm } => {
            Ok(Box::new(SgdMomentum::new(lr, mu, clip_norm, n_hidden, n_in, n_out)))
        }
    }
}
