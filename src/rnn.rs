//! The RNN cell: parameter storage, the leaky-integrator forward step, the
//! output head, and the immediate-past Jacobian every learning algorithm
//! consumes.
//!
//! `RnnConfig` is a cloned, `Default`-able configuration struct validated
//! once at construction, and [`Rnn::new`] builds directly from explicit
//! parameter values rather than assembling a layer graph -- this engine
//! trains exactly one fixed-shape recurrent cell, never a DAG of layers.
use ndarray::{Array1, Array2};

use crate::activation::{Activation, Loss, OutputFn};
use crate::error::ConfigError;
use crate::math;
use crate::rng::Rng;

/// Configuration shared by every run of an [`Rnn`]: the leak coefficient and
/// the choice of nonlinearity / output head / loss from the catalogue in
/// [`crate::activation`].
#[derive(Debug, Clone, Copy)]
pub struct RnnConfig {
    /// Leak / integration step `α ∈ (0, 1]`. `α = 1` yields a non-leaky RNN.
    pub alpha: f64,
    /// Hidden-layer nonlinearity `φ`.
    pub activation: Activation,
    /// Output-head nonlinearity.
    pub output: OutputFn,
    /// Loss function, paired with `output` (softmax + cross-entropy for
    /// classification, identity + mean-squared-error for regression).
    pub loss: Loss,
}

impl Default for RnnConfig {
    fn default() -> RnnConfig {
        RnnConfig {
            alpha: 1.0,
            activation: Activation::Tanh,
            output: OutputFn::Identity,
            loss: Loss::MeanSquaredError,
        }
    }
}

impl RnnConfig {
    /// Check that `alpha` lies in the valid `(0, 1]` range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ConfigError::InvalidOption {
                key: "alpha".to_owned(),
                reason: format!("must lie in (0, 1], got {}", self.alpha),
            });
        }
        Ok(())
    }
}

/// The five trainable tensors and their gradient counterparts, always kept
/// in the canonical order `[W_rec, W_in, b_rec, W_out, b_out]`. Shared by
/// [`Rnn`] (as the live parameters) and by every learning algorithm's
/// `emit_gradients` (as the gradient it hands the optimizer).
#[derive(Debug, Clone)]
pub struct Gradients {
    /// Gradient (or parameter) of shape `(n_hidden, n_hidden)`.
    pub d_w_rec: Array2<f64>,
    /// Gradient (or parameter) of shape `(n_hidden, n_in)`.
    pub d_w_in: Array2<f64>,
    /// Gradient (or parameter) of shape `(n_hidden,)`.
    pub d_b_rec: Array1<f64>,
    /// Gradient (or parameter) of shape `(n_out, n_hidden)`.
    pub d_w_out: Array2<f64>,
    /// Gradient (or parameter) of shape `(n_out,)`.
    pub d_b_out: Array1<f64>,
}

impl Gradients {
    /// All-zero gradients sized for an RNN with the given dimensions.
    pub fn zeros(n_hidden: usize, n_in: usize, n_out: usize) -> Gradients {
        Gradients {
            d_w_rec: Array2::zeros((n_hidden, n_hidden)),
            d_w_in: Array2::zeros((n_hidden, n_in)),
            d_b_rec: Array1::zeros(n_hidden),
            d_w_out: Array2::zeros((n_out, n_hidden)),
            d_b_out: Array1::zeros(n_out),
        }
    }

    /// Global L2 norm across all five tensors, used for gradient clipping
    /// and for `-norm` monitor paths.
    pub fn global_norm(&self) -> f64 {
        let sq = |m: &Array2<f64>| m.iter().map(|x| x * x).sum::<f64>();
        let sqv = |v: &Array1<f64>| v.iter().map(|x| x * x).sum::<f64>();
        (sq(&self.d_w_rec) + sq(&self.d_w_in) + sqv(&self.d_b_rec) + sq(&self.d_w_out) + sqv(&self.d_b_out)).sqrt()
    }

    /// Scale every tensor in place by `s`.
    pub fn scale(&mut self, s: f64) {
        self.d_w_rec.mapv_inplace(|x| x * s);
        self.d_w_in.mapv_inplace(|x| x * s);
        self.d_b_rec.mapv_inplace(|x| x * s);
        self.d_w_out.mapv_inplace(|x| x * s);
        self.d_b_out.mapv_inplace(|x| x * s);
    }

    /// Add L2 regularization `λ·W` to the weight (not bias) tensors, as
    /// required of every recurrent gradient.
    pub fn add_l2(&mut self, w_rec: &Array2<f64>, w_in: &Array2<f64>, w_out: &Array2<f64>, lambda: f64) {
        if lambda == 0.0 {
            return;
        }
        self.d_w_rec.scaled_add(lambda, w_rec);
        self.d_w_in.scaled_add(lambda, w_in);
        self.d_w_out.scaled_add(lambda, w_out);
    }

    /// `true` if every component of every tensor is finite.
    pub fn all_finite(&self) -> bool {
        math::all_finite2(self.d_w_rec.view())
            && math::all_finite2(self.d_w_in.view())
            && math::all_finite1(self.d_b_rec.view())
            && math::all_finite2(self.d_w_out.view())
            && math::all_finite1(self.d_b_out.view())
    }
}

/// Unflatten a length-`P_h = H*H + H*I + H` vector (column-major per
/// segment, per the canonical flattening convention) into the hidden-layer
/// gradient triple `(dW_rec, dW_in, db_rec)`. Used by every learning
/// algorithm that derives its recurrent gradient from a flat Kronecker /
/// rank-1 representation (RTRL, UORO, KF-RTRL, DNI, RFLO).
pub fn split_hidden_grad(flat: &Array1<f64>, n_hidden: usize, n_in: usize) -> (Array2<f64>, Array2<f64>, Array1<f64>) {
    let w_rec_size = n_hidden * n_hidden;
    let w_in_size = n_hidden * n_in;
    let d_w_rec = math::unflatten_col_major(flat.slice(ndarray::s![0..w_rec_size]), n_hidden, n_hidden);
    let d_w_in = math::unflatten_col_major(
        flat.slice(ndarray::s![w_rec_size..w_rec_size + w_in_size]),
        n_hidden,
        n_in,
    );
    let d_b_rec = flat.slice(ndarray::s![w_rec_size + w_in_size..]).to_owned();
    (d_w_rec, d_w_in, d_b_rec)
}

/// A vanilla leaky-integrator RNN cell, following
/// `h_t = (1-α)·h_{t-1} + W_rec·a_{t-1} + W_in·x_t + b_rec + σ·ξ`,
/// `a_t = φ(h_t)`, `z_t = W_out·a_t + b_out`, `y_hat = out(z_t)`.
#[derive(Debug, Clone)]
pub struct Rnn {
    /// Recurrent weight matrix, `(n_hidden, n_hidden)`.
    pub w_rec: Array2<f64>,
    /// Input weight matrix, `(n_hidden, n_in)`.
    pub w_in: Array2<f64>,
    /// Recurrent bias, `(n_hidden,)`.
    pub b_rec: Array1<f64>,
    /// Output weight matrix, `(n_out, n_hidden)`.
    pub w_out: Array2<f64>,
    /// Output bias, `(n_out,)`.
    pub b_out: Array1<f64>,

    config: RnnConfig,

    /// Number of inputs.
    pub n_in: usize,
    /// Number of hidden units.
    pub n_hidden: usize,
    /// Number of outputs.
    pub n_out: usize,

    /// Current pre-activation.
    pub h: Array1<f64>,
    /// Current activation, `φ(h)`.
    pub a: Array1<f64>,
    /// Current output pre-nonlinearity, `W_out·a + b_out`.
    pub z: Array1<f64>,
    /// Current prediction, `out(z)`.
    pub y_hat: Array1<f64>,
    /// Current scalar loss.
    pub loss_: f64,
    /// Current error signal, `∂loss/∂z`.
    pub error: Array1<f64>,

    /// Previous-step pre-activation.
    pub h_prev: Array1<f64>,
    /// Previous-step activation.
    pub a_prev: Array1<f64>,
    /// Current-step input.
    pub x: Array1<f64>,
    /// Previous-step input.
    pub x_prev: Array1<f64>,
    /// Current-step label.
    pub y: Array1<f64>,
    /// Previous-step label. Maintained by the simulation driver, not by
    /// [`Rnn::z_out`], since the label for a step is supplied by the
    /// caller rather than produced by the cell itself.
    pub y_prev: Array1<f64>,

    /// Immediate-past Jacobian `∂a_t/∂a_{t-1}`, recomputed each step by
    /// [`Rnn::get_a_jacobian`].
    pub a_j: Array2<f64>,
}

impl Rnn {
    /// Construct an RNN from explicit parameter values, checking every
    /// dimension invariant up front (§3 "Dimension checks enforced at
    /// construction and never re-checked in the loop").
    pub fn new(
        w_rec: Array2<f64>,
        w_in: Array2<f64>,
        b_rec: Array1<f64>,
        w_out: Array2<f64>,
        b_out: Array1<f64>,
        config: RnnConfig,
        rng: &mut Rng,
    ) -> Result<Rnn, ConfigError> {
        config.validate()?;

        let n_hidden = w_rec.nrows();
        let n_in = w_in.ncols();
        let n_out = w_out.nrows();

        if w_rec.ncols() != n_hidden {
            return Err(ConfigError::DimensionMismatch(format!(
                "W_rec must be square, got {:?}",
                w_rec.dim()
            )));
        }
        if w_in.nrows() != n_hidden {
            return Err(ConfigError::DimensionMismatch(format!(
                "W_in has {} rows, expected n_hidden={}",
                w_in.nrows(),
                n_hidden
            )));
        }
        if b_rec.len() != n_hidden {
            return Err(ConfigError::DimensionMismatch(format!(
                "b_rec has length {}, expected n_hidden={}",
                b_rec.len(),
                n_hidden
            )));
        }
        if w_out.ncols() != n_hidden {
            return Err(ConfigError::DimensionMismatch(format!(
                "W_out has {} columns, expected n_hidden={}",
                w_out.ncols(),
                n_hidden
            )));
        }
        if b_out.len() != n_out {
            return Err(ConfigError::DimensionMismatch(format!(
                "b_out has length {}, expected n_out={}",
                b_out.len(),
                n_out
            )));
        }

        let mut rnn = Rnn {
            w_rec,
            w_in,
            b_rec,
            w_out,
            b_out,
            config,
            n_in,
            n_hidden,
            n_out,
            h: Array1::zeros(n_hidden),
            a: Array1::zeros(n_hidden),
            z: Array1::zeros(n_out),
            y_hat: Array1::zeros(n_out),
            loss_: 0.0,
            error: Array1::zeros(n_out),
            h_prev: Array1::zeros(n_hidden),
            a_prev: Array1::zeros(n_hidden),
            x: Array1::zeros(n_in),
            x_prev: Array1::zeros(n_in),
            y: Array1::zeros(n_out),
            y_prev: Array1::zeros(n_out),
            a_j: Array2::zeros((n_hidden, n_hidden)),
        };
        rnn.reset(None, None, rng);
        Ok(rnn)
    }

    /// Total trainable parameter count `P = H² + HI + H + OH + O`.
    pub fn n_params(&self) -> usize {
        self.n_hidden * self.n_hidden + self.n_hidden * self.n_in + self.n_hidden + self.n_out * self.n_hidden + self.n_out
    }

    /// Hidden-parameter count `P_h = H² + HI + H`.
    pub fn n_hidden_params(&self) -> usize {
        self.n_hidden * self.n_hidden + self.n_hidden * self.n_in + self.n_hidden
    }

    /// The augmented input `â = [a_{t-1}; x_t; 1]`, shape `(H+I+1,)`.
    pub fn a_hat(&self) -> Array1<f64> {
        let one = Array1::from_elem(1, 1.0);
        math::concat(&[self.a_prev.view(), self.x.view(), one.view()])
    }

    /// Advance the RNN one time step given input `x` and forward-pass noise
    /// standard deviation `sigma` (0 for a noiseless step).
    pub fn next_state(&mut self, x: &Array1<f64>, sigma: f64, rng: &mut Rng) {
        self.x_prev.assign(&self.x);
        self.x = x.clone();
        self.h_prev.assign(&self.h);
        self.a_prev.assign(&self.a);

        let mut h_next = &self.h_prev * (1.0 - self.config.alpha) + self.w_rec.dot(&self.a_prev) + self.w_in.dot(x) + &self.b_rec;
        if sigma > 0.0 {
            h_next += &rng.normal_vec(self.n_hidden, 0.0, sigma);
        }
        self.h = h_next;
        self.a = self.config.activation.f(&self.h);
    }

    /// Compute the output head, prediction, loss, and error for label `y`.
    pub fn z_out(&mut self, y: &Array1<f64>) {
        self.y = y.clone();
        self.z = self.w_out.dot(&self.a) + &self.b_out;
        self.y_hat = self.config.output.f(&self.z);
        self.loss_ = self.config.loss.f(&self.z, y);
        self.error = self.config.loss.f_prime(&self.z, y);
    }

    /// Reset the hidden state. `a` overrides the activation directly (the
    /// pre-activation is taken to equal it, so the next Jacobian computation
    /// degenerates gracefully); otherwise `sigma` (or the default
    /// `1/sqrt(H)`) controls the standard deviation of a fresh
    /// `N(0, sigma^2)` draw for `h`.
    pub fn reset(&mut self, a: Option<Array1<f64>>, sigma: Option<f64>, rng: &mut Rng) {
        match a {
            Some(a_val) => {
                self.h = a_val.clone();
                self.a = a_val;
            }
            None => {
                let s = sigma.unwrap_or(1.0 / (self.n_hidden as f64).sqrt());
                self.h = rng.normal_vec(self.n_hidden, 0.0, s);
                self.a = self.config.activation.f(&self.h);
            }
        }
    }

    /// Recompute `a_J = diag(φ'(h_t)) · (W_rec + diag((1-α)/φ'(h_{t-1})))`
    /// from the current `h` and the just-captured `h_prev`.
    pub fn get_a_jacobian(&mut self) -> &Array2<f64> {
        let phi_prime_h = self.config.activation.f_prime(&self.h);
        let phi_prime_h_prev = self.config.activation.f_prime(&self.h_prev);
        let leak_term = phi_prime_h_prev.mapv(|q| (1.0 - self.config.alpha) / q);
        let inner = &self.w_rec + &math::diag(leak_term.view());
        self.a_j = math::diag(phi_prime_h.view()).dot(&inner);
        &self.a_j
    }

    /// `∂a_t/∂θ_hidden` at fixed `a_{t-1}`: the Kronecker product
    /// `â ⊗ diag(φ'(h_t))`, shape `(H, P_h)`.
    pub fn partial_a_partial_w(&self) -> Array2<f64> {
        let a_hat = self.a_hat();
        let phi_prime = self.config.activation.f_prime(&self.h);
        math::kron_mat(math::to_row(a_hat.view()).view(), math::diag(phi_prime.view()).view())
    }

    /// The shared output-head gradient: `dW_out = e ⊗ a`, `db_out = e`.
    pub fn output_head_gradient(&self) -> (Array2<f64>, Array1<f64>) {
        (math::outer(self.error.view(), self.a.view()), self.error.clone())
    }

    /// `q = eᵀ·W_out`, the immediate downstream sensitivity every recurrent
    /// gradient is built from.
    pub fn q(&self) -> Array1<f64> {
        self.error.dot(&self.w_out)
    }

    /// The leak coefficient this cell was configured with.
    pub fn alpha(&self) -> f64 {
        self.config.alpha
    }

    /// The hidden-layer nonlinearity this cell was configured with.
    pub fn activation(&self) -> Activation {
        self.config.activation
    }

    /// `φ'(h_t)` at the current pre-activation.
    pub fn phi_prime(&self) -> Array1<f64> {
        self.config.activation.f_prime(&self.h)
    }

    /// `φ'(h_{t-1})` at the previous step's pre-activation.
    pub fn phi_prime_prev(&self) -> Array1<f64> {
        self.config.activation.f_prime(&self.h_prev)
    }

    /// `true` if the network's live state (loss, error, activation,
    /// parameters) is entirely finite.
    pub fn is_finite(&self) -> bool {
        self.loss_.is_finite()
            && math::all_finite1(self.error.view())
            && math::all_finite1(self.a.view())
            && math::all_finite2(self.w_rec.view())
            && math::all_finite2(self.w_in.view())
            && math::all_finite2(self.w_out.view())
    }
}
