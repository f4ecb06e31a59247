//! Plain stochastic gradient descent: `θ ← θ - lr·g`.
use super::Optimizer;
use crate::rnn::{Gradients, Rnn};

/// Vanilla SGD, with no persistent state beyond its learning rate. Reused
/// as the inner optimizer for DNI/DNIb's synthetic-gradient regression and
/// KeRNL's sensitivity-matrix fit, as well as as a top-level choice in
/// [`super::OptimizerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    lr: f64,
}

impl Sgd {
    /// Construct an SGD optimizer with the given learning rate.
    pub fn new(lr: f64) -> Sgd {
        Sgd { lr }
    }
}

impl Optimizer for Sgd {
    fn apply(&mut self, rnn: &mut Rnn, grads: &Gradients) {
        rnn.w_rec.scaled_add(-self.lr, &grads.d_w_rec);
        rnn.w_in.scaled_add(-self.lr, &grads.d_w_in);
        rnn.b_rec.scaled_add(-self.lr, &grads.d_b_rec);
        rnn.w_out.scaled_add(-self.lr, &grads.d_w_out);
        rnn.b_out.scaled_add(-self.lr, &grads.d_b_out);
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Activation, Loss, OutputFn};
    use crate::rng::Rng;
    use crate::rnn::RnnConfig;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn step_moves_parameters_by_minus_lr_times_grad() {
        let mut rng = Rng::new(7);
        let mut rnn = Rnn::new(
            array![[0.0]],
            array![[0.0]],
            array![0.0],
            array![[0.0]],
            array![0.0],
            RnnConfig {
                alpha: 1.0,
                activation: Activation::Identity,
                output: OutputFn::Identity,
                loss: Loss::MeanSquaredError,
            },
            &mut rng,
        )
        .unwrap();

        let mut grads = Gradients::zeros(1, 1, 1);
        grads.d_w_rec[[0, 0]] = 2.0;
        let mut sgd = Sgd::new(0.1);
        sgd.apply(&mut rnn, &grads);
        assert_relative_eq!(rnn.w_rec[[0, 0]], -0.2);
    }
}
