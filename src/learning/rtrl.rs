//! Exact real-time recurrent learning: a dense running Jacobian, updated
//! every step and never truncated.
use ndarray::Array2;

use super::{CheckpointState, LearningAlgorithm};
use crate::rng::Rng;
use crate::rnn::{split_hidden_grad, Gradients, Rnn};

/// RTRL's running estimate `dadw = ∂a_t/∂θ_hidden`, shape `(H, P_h)`.
/// Quadratic in `H` to maintain and update; the exact estimate every
/// approximation in this crate is checked against.
pub struct Rtrl {
    dadw: Array2<f64>,
    n_hidden: usize,
    n_in: usize,
}

impl Rtrl {
    /// Construct RTRL with `dadw` initialized from `N(0, 1)` draws, per the
    /// N(0, 1) state initialization common to this algorithm family.
    pub fn new(n_hidden: usize, n_in: usize, rng: &mut Rng) -> Rtrl {
        let p_h = n_hidden * (n_hidden + n_in + 1);
        Rtrl {
            dadw: rng.normal_mat(n_hidden, p_h, 0.0, 1.0),
            n_hidden,
            n_in,
        }
    }
}

impl LearningAlgorithm for Rtrl {
    fn name(&self) -> &'static str {
        "RTRL"
    }

    fn update_learning_vars(&mut self, rnn: &Rnn, _rng: &mut Rng) {
        self.dadw = rnn.a_j.dot(&self.dadw) + rnn.partial_a_partial_w();
    }

    fn emit_gradients(&mut self, rnn: &Rnn) -> Gradients {
        let flat = rnn.q().dot(&self.dadw);
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
        self.dadw.fill(0.0);
    }

    fn checkpoint(&self) -> CheckpointState {
        CheckpointState::Rtrl { dadw: self.dadw.clone() }
    }

    fn restore(&mut self, state: CheckpointState) {
        if let CheckpointState::Rtrl { dadw } = state {
            self.dadw = dadw;
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
    fn emitted_gradient_has_canonical_shapes() {
        let mut rng = Rng::new(11);
        let mut rnn = Rnn::new(
            array![[0.1, -0.2], [0.05, 0.2]],
            array![[0.3], [-0.1]],
            array![0.0, 0.0],
            array![[1.0, -1.0]],
            array![0.0],
            RnnConfig {
                alpha: 1.0,
                activation: Activation::Tanh,
                output: OutputFn::Identity,
                loss: Loss::MeanSquaredError,
            },
            &mut rng,
        )
        .unwrap();
        let mut alg = Rtrl::new(2, 1, &mut rng);
        let x = array![0.5];
        let y = array![0.2];
        rnn.next_state(&x, 0.0, &mut rng);
        rnn.z_out(&y);
        rnn.get_a_jacobian();
        alg.update_learning_vars(&rnn, &mut rng);
        let grads = alg.emit_gradients(&rnn);
        assert_eq!(grads.d_w_rec.dim(), (2, 2));
        assert_eq!(grads.d_w_in.dim(), (2, 1));
        assert_eq!(grads.d_b_rec.len(), 2);
    }

    #[test]
    fn reset_zeros_the_running_jacobian() {
        let mut rng = Rng::new(12);
        let mut alg = Rtrl::new(2, 1, &mut rng);
        alg.reset_learning();
        assert!(alg.dadw.iter().all(|&x| x == 0.0));
    }
}
