//! The learning-algorithm family: RTRL and its approximations, each sharing
//! one capability interface and composable in comparison mode.
//!
//! [`LearningAlgorithm`] is one small capability interface, one concrete
//! struct per algorithm, dispatched by a tagged [`AlgorithmConfig`] rather
//! than runtime downcasting.
mod bptt;
mod checkpoint;
mod dni;
mod kernl;
mod kf_rtrl;
mod only_output;
mod rflo;
mod rtrl;
mod uoro;

pub use bptt::{Bptt, BpttMode};
pub use checkpoint::CheckpointState;
pub use dni::Dni;
pub use kernl::Kernl;
pub use kf_rtrl::{KfRtrl, ReverseKfRtrl};
pub use only_output::OnlyOutputWeights;
pub use rflo::Rflo;
pub use rtrl::Rtrl;
pub use uoro::Uoro;

use crate::error::ConfigError;
use crate::rng::Rng;
use crate::rnn::{Gradients, Rnn};

/// The capability every learning algorithm exposes, per the configuration
/// surface's algorithm catalogue `{Only_Output_Weights, RTRL, UORO,
/// KF-RTRL, R-KF-RTRL, BPTT, Future_BPTT, Efficient_BPTT, DNI, DNIb, RFLO,
/// KeRNL}`.
pub trait LearningAlgorithm {
    /// Stable identifier used by monitors and the comparison mechanism.
    /// Names containing `"BPTT"` are treated by the simulation driver as
    /// look-back algorithms for alignment-matrix indexing.
    fn name(&self) -> &'static str;

    /// Called once per time step after the forward pass, before gradient
    /// emission. Reads `a, a_prev, h, h_prev, x, y, y_prev, a_J` from `rnn`;
    /// mutates only this algorithm's own estimator state.
    fn update_learning_vars(&mut self, rnn: &Rnn, rng: &mut Rng);

    /// Reshape-and-split the flattened gradient using the canonical
    /// parameter layout, sharing the output-head gradient `dW_out = e⊗a`,
    /// `db_out = e` every algorithm produces the same way.
    fn emit_gradients(&mut self, rnn: &Rnn) -> Gradients;

    /// Clear per-episode eligibility/trace state at trial boundaries.
    fn reset_learning(&mut self);

    /// Truncation horizon, for algorithms that have one. Used by the driver
    /// to size its comparison-mode lag buffer.
    fn t_truncation(&self) -> Option<usize> {
        None
    }

    /// Deep-copy this algorithm's estimator state for the checkpoint map.
    fn checkpoint(&self) -> CheckpointState;

    /// Restore estimator state previously produced by [`Self::checkpoint`].
    /// A mismatched variant (which should not occur in practice, since
    /// checkpoints are keyed by the algorithm that produced them) is
    /// ignored rather than panicking.
    fn restore(&mut self, state: CheckpointState);
}

/// Tagged configuration for one member of the learning-algorithm family,
/// mirroring the configuration surface's algorithm enumeration.
#[derive(Debug, Clone, Copy)]
pub enum AlgorithmConfig {
    /// Only the output head learns; recurrent gradients are always zero.
    OnlyOutputWeights,
    /// Exact real-time recurrent learning.
    Rtrl,
    /// Unbiased online recurrent optimization (rank-1 stochastic).
    Uoro,
    /// Kronecker-factored RTRL.
    KfRtrl,
    /// Reverse Kronecker-factored RTRL.
    ReverseKfRtrl,
    /// Full (non-truncated) backpropagation through time.
    Bptt,
    /// Sliding-window truncated BPTT, emitting a gradient every step once
    /// the window fills.
    FutureBptt {
        /// Truncation horizon.
        t_trunc: usize,
    },
    /// Fixed-horizon truncated BPTT, emitting a gradient only on buffer
    /// flush.
    EfficientBptt {
        /// Truncation horizon.
        t_trunc: usize,
    },
    /// Bootstrapped synthetic-gradient learning.
    Dni {
        /// Inner learning rate for the synthetic-gradient model.
        inner_lr: f64,
        /// L2 coefficient on the synthetic-gradient parameters.
        l2_sg: f64,
        /// Target-network exponential smoothing coefficient.
        alpha_sg_target: f64,
        /// Inner iteration count per outer step.
        n_sg: usize,
    },
    /// DNI with a learned approximate Jacobian.
    Dnib {
        /// Inner learning rate for the synthetic-gradient model.
        inner_lr: f64,
        /// L2 coefficient on the synthetic-gradient parameters.
        l2_sg: f64,
        /// Target-network exponential smoothing coefficient.
        alpha_sg_target: f64,
        /// Inner iteration count per outer step.
        n_sg: usize,
        /// Learning rate for the approximate-Jacobian / feedback weights.
        j_lr: f64,
    },
    /// Random-feedback local online learning (eligibility-trace
    /// diagonal approximation).
    Rflo,
    /// Kernel RNN learning (perturbation-based sensitivity fit).
    Kernl {
        /// Inner learning rate for the timescale fit.
        inner_lr: f64,
        /// Standard deviation of the internal probe perturbation.
        sigma_noise: f64,
    },
}

impl AlgorithmConfig {
    /// Construct the concrete algorithm this configuration names, sized for
    /// an RNN of the given dimensions.
    pub fn build(&self, n_hidden: usize, n_in: usize, n_out: usize, rng: &mut Rng) -> Result<Box<dyn LearningAlgorithm>, ConfigError> {
        match *self {
            AlgorithmConfig::OnlyOutputWeights => Ok(Box::new(OnlyOutputWeights)),
            AlgorithmConfig::Rtrl => Ok(Box::new(Rtrl::new(n_hidden, n_in, rng))),
            AlgorithmConfig::Uoro => Ok(Box::new(Uoro::new(n_hidden, n_in, rng))),
            AlgorithmConfig::KfRtrl => Ok(Box::new(KfRtrl::new(n_hidden, n_in, rng))),
            AlgorithmConfig::ReverseKfRtrl => Ok(Box::new(ReverseKfRtrl::new(n_hidden, n_in, rng))),
            AlgorithmConfig::Bptt => Ok(Box::new(Bptt::new(n_hidden, n_in, None, BpttMode::Plain))),
            AlgorithmConfig::FutureBptt { t_trunc } => {
                if t_trunc == 0 {
                    return Err(ConfigError::InvalidOption {
                        key: "t_trunc".to_owned(),
                        reason: "must be positive".to_owned(),
                    });
                }
                Ok(Box::new(Bptt::new(n_hidden, n_in, Some(t_trunc), BpttMode::Future)))
            }
            AlgorithmConfig::EfficientBptt { t_trunc } => {
                if t_trunc == 0 {
                    return Err(ConfigError::InvalidOption {
                        key: "t_trunc".to_owned(),
                        reason: "must be positive".to_owned(),
                    });
                }
                Ok(Box::new(Bptt::new(n_hidden, n_in, Some(t_trunc), BpttMode::Efficient)))
            }
            AlgorithmConfig::Dni { inner_lr, l2_sg, alpha_sg_target, n_sg } => {
                Ok(Box::new(Dni::new(n_hidden, n_in, n_out, inner_lr, l2_sg, alpha_sg_target, n_sg, None)))
            }
            AlgorithmConfig::Dnib { inner_lr, l2_sg, alpha_sg_target, n_sg, j_lr } => {
                Ok(Box::new(Dni::new(n_hidden, n_in, n_out, inner_lr, l2_sg, alpha_sg_target, n_sg, Some(j_lr))))
            }
            AlgorithmConfig::Rflo => Ok(Box::new(Rflo::new(n_hidden, n_in))),
            AlgorithmConfig::Kernl { inner_lr, sigma_noise } => Ok(Box::new(Kernl::new(n_hidden, n_in, inner_lr, sigma_noise))),
        }
    }
}
