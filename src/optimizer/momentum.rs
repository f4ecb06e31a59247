//! SGD with a momentum term and optional global-norm gradient clipping.
//!
//! Momentum in solving neural networks works similarly to the way it does
//! in physics: once a parameter is moving in a direction at some velocity,
//! it takes a sustained opposing gradient to reverse it. Keeping a fraction
//! `μ` of the previous update around each step lets consistent gradients
//! accumulate speed, which tends to both converge faster and damp
//! oscillation across ill-conditioned directions.
use super::Optimizer;
use crate::rnn::{Gradients, Rnn};

/// SGD with momentum: `v ← μ·v + g`, `θ ← θ - lr·v`, with an optional
/// global-norm clip applied to `g` before the velocity update.
#[derive(Debug, Clone)]
pub struct SgdMomentum {
    lr: f64,
    mu: f64,
    clip_norm: Option<f64>,
    velocity: Gradients,
}

impl SgdMomentum {
    /// Construct a momentum optimizer with its velocity buffers sized for
    /// an RNN of the given dimensions.
    pub fn new(lr: f64, mu: f64, clip_norm: Option<f64>, n_hidden: usize, n_in: usize, n_out: usize) -> SgdMomentum {
        SgdMomentum {
            lr,
            mu,
            clip_norm,
            velocity: Gradients::zeros(n_hidden, n_in, n_out),
        }
    }
}

impl Optimizer for SgdMomentum {
    fn apply(&mut self, rnn: &mut Rnn, grads: &Gradients) {
        let mut g = grads.clone();
        if let Some(c) = self.clip_norm {
            let g_norm = g.global_norm();
            if g_norm > c {
                g.scale(c / g_norm);
            }
        }

        self.velocity.d_w_rec = &self.velocity.d_w_rec * self.mu + &g.d_w_rec;
        self.velocity.d_w_in = &self.velocity.d_w_in * self.mu + &g.d_w_in;
        self.velocity.d_b_rec = &self.velocity.d_b_rec * self.mu + &g.d_b_rec;
        self.velocity.d_w_out = &self.velocity.d_w_out * self.mu + &g.d_w_out;
        self.velocity.d_b_out = &self.velocity.d_b_out * self.mu + &g.d_b_out;

        rnn.w_rec.scaled_add(-self.lr, &self.velocity.d_w_rec);
        rnn.w_in.scaled_add(-self.lr, &self.velocity.d_w_in);
        rnn.b_rec.scaled_add(-self.lr, &self.velocity.d_b_rec);
        rnn.w_out.scaled_add(-self.lr, &self.velocity.d_w_out);
        rnn.b_out.scaled_add(-self.lr, &self.velocity.d_b_out);
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

    fn toy_rnn(rng: &mut Rng) -> Rnn {
        Rnn::new(
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
            rng,
        )
        .unwrap()
    }

    #[test]
    fn zero_momentum_matches_plain_sgd() {
        let mut rng = Rng::new(3);
        let mut rnn = toy_rnn(&mut rng);
        let mut grads = Gradients::zeros(1, 1, 1);
        grads.d_w_rec[[0, 0]] = 4.0;
        let mut opt = SgdMomentum::new(0.1, 0.0, None, 1, 1, 1);
        opt.apply(&mut rnn, &grads);
        assert_relative_eq!(rnn.w_rec[[0, 0]], -0.4);
    }

    #[test]
    fn momentum_accumulates_across_steps() {
        let mut rng = Rng::new(4);
        let mut rnn = toy_rnn(&mut rng);
        let mut grads = Gradients::zeros(1, 1, 1);
        grads.d_w_rec[[0, 0]] = 1.0;
        let mut opt = SgdMomentum::new(0.1, 0.5, None, 1, 1, 1);
        opt.apply(&mut rnn, &grads);
        opt.apply(&mut rnn, &grads);
        // v1 = 1, v2 = 0.5*1 + 1 = 1.5; total update = -0.1*(1 + 1.5) = -0.25
        assert_relative_eq!(rnn.w_rec[[0, 0]], -0.25, epsilon = 1e-12);
    }

    #[test]
    fn clipping_shrinks_large_gradients_before_momentum() {
        let mut rng = Rng::new(5);
        let mut rnn = toy_rnn(&mut rng);
        let mut grads = Gradients::zeros(1, 1, 1);
        grads.d_w_rec[[0, 0]] = 100.0;
        let mut opt = SgdMomentum::new(0.1, 0.0, Some(1.0), 1, 1, 1);
        opt.apply(&mut rnn, &grads);
        assert_relative_eq!(rnn.w_rec[[0, 0]], -0.1, epsilon = 1e-9);
    }

    #[test]
    fn clipping_at_or_above_the_gradient_norm_is_a_no_op() {
        let mut rng = Rng::new(6);
        let mut rnn = toy_rnn(&mut rng);
        let mut grads = Gradients::zeros(1, 1, 1);
        grads.d_w_rec[[0, 0]] = 2.0;
        let norm = grads.global_norm();
        let mut unclipped = SgdMomentum::new(0.1, 0.0, None, 1, 1, 1);
        let mut clipped_at_norm = SgdMomentum::new(0.1, 0.0, Some(norm), 1, 1, 1);
        let mut rnn_clipped = rnn.clone();
        unclipped.apply(&mut rnn, &grads);
        clipped_at_norm.apply(&mut rnn_clipped, &grads);
        assert_relative_eq!(rnn.w_rec[[0, 0]], rnn_clipped.w_rec[[0, 0]], epsilon = 1e-12);
    }

    #[test]
    fn clipping_accounts_for_bias_gradients_too() {
        let mut rng = Rng::new(8);
        let mut rnn = toy_rnn(&mut rng);
        let mut grads = Gradients::zeros(1, 1, 1);
        // All the gradient mass sits on the biases; a clip norm computed
        // only from the weight tensors would see a norm of 0 and never
        // rescale.
        grads.d_b_rec[0] = 3.0;
        grads.d_b_out[0] = 4.0;
        let mut opt = SgdMomentum::new(0.1, 0.0, Some(1.0), 1, 1, 1);
        opt.apply(&mut rnn, &grads);
        // global norm is 5; clipped to 1 scales by 1/5.
        assert_relative_eq!(rnn.b_rec[0], -0.1 * (3.0 / 5.0), epsilon = 1e-9);
        assert_relative_eq!(rnn.b_out[0], -0.1 * (4.0 / 5.0), epsilon = 1e-9);
    }
}
