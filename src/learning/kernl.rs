//! Kernel RNN learning: a per-unit learned timescale distills the true
//! Jacobian into a cheap geometric eligibility trace, fit by regressing an
//! internal probe perturbation against the Jacobian's actual action on it.
//!
//! The reference algorithm injects its perturbation directly into the
//! network's forward dynamics; this engine's RNN cell exposes only a single
//! shared noise channel (`σ`, a simulation-wide forward-pass perturbation),
//! so the probe here is carried purely inside the algorithm's own state as
//! a synthetic comparison against the true per-step Jacobian, never fed
//! back into the network's real trajectory.
use ndarray::{Array1, Array2, Axis};

use super::{CheckpointState, LearningAlgorithm};
use crate::math;
use crate::rng::Rng;
use crate::rnn::{split_hidden_grad, Gradients, Rnn};

/// Per-unit timescale `κ` and the eligibility trace `sens` it filters,
/// shape `(H, H+I+1)`.
pub struct Kernl {
    kappa: Array1<f64>,
    sens: Array2<f64>,
    perturbation: Array1<f64>,
    inner_lr: f64,
    sigma_noise: f64,
    n_hidden: usize,
    n_in: usize,
}

impl Kernl {
    /// Construct KeRNL with `κ` initialized to the identity decay (no
    /// leak) and a zero eligibility trace.
    pub fn new(n_hidden: usize, n_in: usize, inner_lr: f64, sigma_noise: f64) -> Kernl {
        Kernl {
            kappa: Array1::from_elem(n_hidden, 0.9),
            sens: Array2::zeros((n_hidden, n_hidden + n_in + 1)),
            perturbation: Array1::zeros(n_hidden),
            inner_lr,
            sigma_noise,
            n_hidden,
            n_in,
        }
    }
}

impl LearningAlgorithm for Kernl {
    fn name(&self) -> &'static str {
        "KeRNL"
    }

    fn update_learning_vars(&mut self, rnn: &Rnn, rng: &mut Rng) {
        // Fit kappa by regressing the kappa-predicted effect of the last
        // probe perturbation against its true effect under a_J.
        let observed = rnn.a_j.dot(&self.perturbation);
        let predicted = &self.kappa * &self.perturbation;
        let residual = &predicted - &observed;
        let grad_kappa = &residual * &self.perturbation;
        self.kappa = (&self.kappa - &(grad_kappa * self.inner_lr)).mapv(|k| k.clamp(0.0, 0.999));

        let a_hat = rnn.a_hat();
        let phi_prime = rnn.phi_prime();
        let immediate = math::outer(phi_prime.view(), a_hat.view());
        let kappa_col = self.kappa.view().insert_axis(Axis(1));
        self.sens = &self.sens * &kappa_col + immediate;

        self.perturbation = rng.normal_vec(self.n_hidden, 0.0, self.sigma_noise);
    }

    fn emit_gradients(&mut self, rnn: &Rnn) -> Gradients {
        let q = rnn.q();
        let q_col = q.view().insert_axis(Axis(1));
        let g = &self.sens * &q_col;
        let flat = math::flatten_col_major(g.view());
        let (d_w_rec, d_w_in, d_b_rec) = split_hidden_grad(&flat, self.n_hidden, self.n_in);
        let (d_w_out, d_b_out) = rnn.output_head_gradient();
        Gradients {
            d_w_rec,
            d_w_in,
            d_b_rec,
            d_w_out,
            d_b_out,
        }
    }

    fn reset_learning(&mut self) {
        self.sens.fill(0.0);
        self.perturbation.fill(0.0);
    }

    fn checkpoint(&self) -> CheckpointState {
        CheckpointState::Kernl {
            kappa: self.kappa.clone(),
            sens: self.sens.clone(),
            perturbation: self.perturbation.clone(),
        }
    }

    fn restore(&mut self, state: CheckpointState) {
        if let CheckpointState::Kernl { kappa, sens, perturbation } = state {
            self.kappa = kappa;
            self.sens = sens;
            self.perturbation = perturbation;
        }
    }
}
