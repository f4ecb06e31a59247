//! Only-Output-Weights: a baseline where the recurrent weights are frozen
//! and only the linear readout learns.
use ndarray::{Array1, Array2};

use super::{CheckpointState, LearningAlgorithm};
use crate::rng::Rng;
use crate::rnn::{Gradients, Rnn};

/// Stateless: there is no recurrent estimator to maintain.
pub struct OnlyOutputWeights;

impl LearningAlgorithm for OnlyOutputWeights {
    fn name(&self) -> &'static str {
        "Only_Output_Weights"
    }

    fn update_learning_vars(&mut self, _rnn: &Rnn, _rng: &mut Rng) {}

    fn emit_gradients(&mut self, rnn: &Rnn) -> Gradients {
        let (d_w_out, d_b_out) = rnn.output_head_gradient();
        Gradients {
            d_w_rec: Array2::zeros((rnn.n_hidden, rnn.n_hidden)),
            d_w_in: Array2::zeros((rnn.n_hidden, rnn.n_in)),
            d_b_rec: Array1::zeros(rnn.n_hidden),
            d_w_out,
            d_b_out,
        }
    }

    fn reset_learning(&mut self) {}

    fn checkpoint(&self) -> CheckpointState {
        CheckpointState::Stateless
    }

    fn restore(&mut self, _state: CheckpointState) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Activation, Loss, OutputFn};
    use crate::rnn::RnnConfig;
    use ndarray::array;

    #[test]
    fn recurrent_gradients_are_always_zero() {
        let mut rng = Rng::new(61);
        let mut rnn = Rnn::new(
            array![[0.2, -0.1], [0.1, 0.3]],
            array![[0.4], [-0.2]],
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
        let mut alg = OnlyOutputWeights;
        rnn.next_state(&array![0.3], 0.0, &mut rng);
        rnn.z_out(&array![0.1]);
        rnn.get_a_jacobian();
        alg.update_learning_vars(&rnn, &mut rng);
        let grads = alg.emit_gradients(&rnn);
        assert!(grads.d_w_rec.iter().all(|&x| x == 0.0));
        assert!(grads.d_w_in.iter().all(|&x| x == 0.0));
        assert!(grads.d_w_out.iter().any(|&x| x != 0.0) || rnn.error.iter().all(|&x| x == 0.0));
    }
}
