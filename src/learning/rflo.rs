//! Random-feedback local online learning: a diagonal eligibility-trace
//! approximation that trades bias for O(P_h) time and space, coupling its
//! leak coefficient to the RNN's own `α`.
use ndarray::{Array2, Axis};

use super::{CheckpointState, LearningAlgorithm};
use crate::math;
use crate::rng::Rng;
use crate::rnn::{Gradients, Rnn};

/// Eligibility trace `M`, shape `(H, H+I+1)`, a low-pass filter of the
/// immediate sensitivity `diag(φ'(h))·â^T`.
pub struct Rflo {
    m: Array2<f64>,
    n_hidden: usize,
    n_in: usize,
}

impl Rflo {
    /// Construct RFLO with a zero eligibility trace.
    pub fn new(n_hidden: usize, n_in: usize) -> Rflo {
        Rflo {
            m: Array2::zeros((n_hidden, n_hidden + n_in + 1)),
            n_hidden,
            n_in,
        }
    }
}

impl LearningAlgorithm for Rflo {
    fn name(&self) -> &'static str {
        "RFLO"
    }

    fn update_learning_vars(&mut self, rnn: &Rnn, _rng: &mut Rng) {
        // The leak here is intentionally the same α as the RNN's own leak
        // coefficient, not an independent hyperparameter.
        let alpha = rnn.alpha();
        let a_hat = rnn.a_hat();
        let phi_prime = rnn.phi_prime();
        let immediate = math::outer(phi_prime.view(), a_hat.view());
        self.m = &self.m * (1.0 - alpha) + &immediate * alpha;
    }

    fn emit_gradients(&mut self, rnn: &Rnn) -> Gradients {
        let q = rnn.q();
        let q_col = q.view().insert_axis(Axis(1));
        let g = &self.m * &q_col;
        let flat = math::flatten_col_major(g.view());
        let (d_w_rec, d_w_in, d_b_rec) = crate::rnn::split_hidden_grad(&flat, self.n_hidden, self.n_in);
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
        self.m.fill(0.0);
    }

    fn checkpoint(&self) -> CheckpointState {
        CheckpointState::Rflo { m: self.m.clone() }
    }

    fn restore(&mut self, state: CheckpointState) {
        if let CheckpointState::Rflo { m } = state {
            self.m = m;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Activation, Loss, OutputFn};
    use crate::rnn::RnnConfig;
    use ndarray::array;

    #[test]
    fn locality_gradient_unaffected_by_prior_history() {
        // RFLO's gradient at time t should depend only on the (t, t-1)
        // pair, not on how the state at t-1 was reached.
        let mut rng = Rng::new(31);
        let mut rnn_a = Rnn::new(
            array![[0.2, -0.1], [0.1, 0.3]],
            array![[0.4], [-0.2]],
            array![0.0, 0.0],
            array![[1.0, -1.0]],
            array![0.0],
            RnnConfig {
                alpha: 0.5,
                activation: Activation::Tanh,
                output: OutputFn::Identity,
                loss: Loss::MeanSquaredError,
            },
            &mut rng,
        )
        .unwrap();
        let mut rnn_b = rnn_a.clone();

        // Drive rnn_a through two different prior histories that land on
        // the same (a_prev, h) pair before the final shared step.
        rnn_a.next_state(&array![0.3], 0.0, &mut rng);
        rnn_a.next_state(&array![-0.2], 0.0, &mut rng);

        rnn_b.next_state(&array![-0.5], 0.0, &mut rng);
        rnn_b.next_state(&array![0.9], 0.0, &mut rng);

        // Force both onto the identical (a_prev, h) pair via reset, then
        // replay the same final step.
        let shared_a = array![0.1, -0.05];
        rnn_a.reset(Some(shared_a.clone()), None, &mut rng);
        rnn_b.reset(Some(shared_a), None, &mut rng);

        let mut alg_a = Rflo::new(2, 1);
        let mut alg_b = Rflo::new(2, 1);
        let x = array![0.2];
        let y = array![0.0];

        rnn_a.next_state(&x, 0.0, &mut rng);
        rnn_a.z_out(&y);
        rnn_a.get_a_jacobian();
        alg_a.update_learning_vars(&rnn_a, &mut rng);
        let grad_a = alg_a.emit_gradients(&rnn_a);

        rnn_b.next_state(&x, 0.0, &mut rng);
        rnn_b.z_out(&y);
        rnn_b.get_a_jacobian();
        alg_b.update_learning_vars(&rnn_b, &mut rng);
        let grad_b = alg_b.emit_gradients(&rnn_b);

        assert_eq!(grad_a.d_w_rec, grad_b.d_w_rec);
        assert_eq!(grad_a.d_w_in, grad_b.d_w_in);
    }
}
