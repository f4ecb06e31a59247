//! The activation and loss catalogue.
//!
//! Every entry is a (value, derivative) pair operating on `Array1<f64>`,
//! collapsed to small `Copy` enums rather than full layer objects: this
//! engine has exactly one hidden nonlinearity and one output/loss pair per
//! run, chosen once at [`crate::rnn::RnnConfig`] time from the fixed
//! catalogue below, never assembled into a graph.
use ndarray::Array1;

/// Hidden-layer nonlinearity `φ`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Activation {
    /// `φ(h) = tanh(h)`.
    #[default]
    Tanh,
    /// `φ(h) = h`.
    Identity,
}

impl Activation {
    /// `φ(h)`, applied elementwise.
    pub fn f(&self, h: &Array1<f64>) -> Array1<f64> {
        match self {
            Activation::Tanh => h.mapv(f64::tanh),
            Activation::Identity => h.clone(),
        }
    }

    /// `φ'(h)`, applied elementwise.
    pub fn f_prime(&self, h: &Array1<f64>) -> Array1<f64> {
        match self {
            Activation::Tanh => h.mapv(|x| 1.0 - x.tanh().powi(2)),
            Activation::Identity => Array1::ones(h.len()),
        }
    }
}

/// The output-head nonlinearity applied to `z` to produce `y_hat`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OutputFn {
    /// `out(z) = z`, paired with [`Loss::MeanSquaredError`] for regression.
    #[default]
    Identity,
    /// `out(z) = softmax(z)`, paired with [`Loss::SoftmaxCrossEntropy`] for
    /// classification.
    Softmax,
}

impl OutputFn {
    /// `out(z)`.
    pub fn f(&self, z: &Array1<f64>) -> Array1<f64> {
        match self {
            OutputFn::Identity => z.clone(),
            OutputFn::Softmax => softmax(z),
        }
    }
}

fn softmax(z: &Array1<f64>) -> Array1<f64> {
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let shifted = z.mapv(|x| (x - max).exp());
    let sum: f64 = shifted.sum();
    shifted / sum
}

/// A loss `loss(z, y)` together with its derivative w.r.t. `z`,
/// `error = ∂loss/∂z`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Loss {
    /// Regression loss: `loss = mean((z - y)^2)`.
    #[default]
    MeanSquaredError,
    /// Classification loss for one-hot `y`: `loss = -sum(y * log(softmax(z)))`.
    SoftmaxCrossEntropy,
}

impl Loss {
    /// Scalar loss for prediction `z` and label `y`.
    pub fn f(&self, z: &Array1<f64>, y: &Array1<f64>) -> f64 {
        match self {
            Loss::MeanSquaredError => {
                let diff = z - y;
                diff.dot(&diff) / (z.len() as f64)
            }
            Loss::SoftmaxCrossEntropy => {
                let p = softmax(z);
                -y.iter()
                    .zip(p.iter())
                    .map(|(&yi, &pi)| yi * (pi.max(1e-300)).ln())
                    .sum::<f64>()
            }
        }
    }

    /// `∂loss/∂z`, the error signal fed back into the network.
    pub fn f_prime(&self, z: &Array1<f64>, y: &Array1<f64>) -> Array1<f64> {
        match self {
            Loss::MeanSquaredError => (z - y) * (2.0 / z.len() as f64),
            // softmax + cross-entropy conveniently differentiate to `p - y`.
            Loss::SoftmaxCrossEntropy => softmax(z) - y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn tanh_derivative_matches_finite_difference() {
        let h = array![0.3, -0.7, 1.2];
        let eps = 1e-6;
        let analytic = Activation::Tanh.f_prime(&h);
        for i in 0..h.len() {
            let mut hp = h.clone();
            hp[i] += eps;
            let mut hm = h.clone();
            hm[i] -= eps;
            let fd = (Activation::Tanh.f(&hp)[i] - Activation::Tanh.f(&hm)[i]) / (2.0 * eps);
            assert_relative_eq!(analytic[i], fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn softmax_cross_entropy_gradient_sums_to_zero() {
        let z = array![1.0, 2.0, 0.5];
        let y = array![0.0, 1.0, 0.0];
        let grad = Loss::SoftmaxCrossEntropy.f_prime(&z, &y);
        assert_relative_eq!(grad.sum(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn mse_gradient_matches_finite_difference() {
        let z = array![1.0, -2.0];
        let y = array![0.5, 0.5];
        let eps = 1e-6;
        let analytic = Loss::MeanSquaredError.f_prime(&z, &y);
        for i in 0..z.len() {
            let mut zp = z.clone();
            zp[i] += eps;
            let mut zm = z.clone();
            zm[i] -= eps;
            let fd = (Loss::MeanSquaredError.f(&zp, &y) - Loss::MeanSquaredError.f(&zm, &y)) / (2.0 * eps);
            assert_relative_eq!(analytic[i], fd, epsilon = 1e-5);
        }
    }
}
