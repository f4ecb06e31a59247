//! Serializable-in-memory snapshots of a learning algorithm's estimator
//! state, one variant per algorithm family, used by the simulation driver's
//! checkpoint map (§4.4 "Checkpointing"). Deliberately not `serde`-backed --
//! on-disk persistence is an explicit non-goal, so this only needs to
//! round-trip within one process.
use ndarray::{Array1, Array2};

/// A deep copy of one learning algorithm's internal estimator state.
#[derive(Debug, Clone)]
pub enum CheckpointState {
    /// Algorithms with no estimator state to snapshot (Only-Output-Weights).
    Stateless,
    /// RTRL's running Jacobian.
    Rtrl {
        /// `∂a_t/∂θ_hidden`, shape `(H, P_h)`.
        dadw: Array2<f64>,
    },
    /// UORO's rank-1 factors.
    Uoro {
        /// Length-`H` factor.
        a_tilde: Array1<f64>,
        /// Length-`P_h` factor.
        theta_tilde: Array1<f64>,
    },
    /// KF-RTRL's Kronecker factors.
    KfRtrl {
        /// Length-`(H+I+1)` factor.
        u: Array1<f64>,
        /// `(H, H)` factor.
        a: Array2<f64>,
    },
    /// Reverse-KF-RTRL's Kronecker factors (different shapes than [`KfRtrl`]).
    ReverseKfRtrl {
        /// Length-`H` factor.
        u: Array1<f64>,
        /// `(H, H+I+1)` factor.
        a: Array2<f64>,
    },
    /// RFLO's eligibility trace.
    Rflo {
        /// `(H, H+I+1)` low-pass filtered sensitivity.
        m: Array2<f64>,
    },
    /// A BPTT-family algorithm's window, as `(h, h_prev, a_prev, x)` tuples
    /// in chronological order.
    Bptt {
        /// Buffered per-step snapshots.
        window: Vec<(Array1<f64>, Array1<f64>, Array1<f64>, Array1<f64>)>,
    },
    /// DNI/DNIb's synthetic-gradient model (and, for DNIb, its learned
    /// approximate Jacobian and fixed feedback weights).
    Dni {
        /// Synthetic-gradient weight on the activation.
        a_mat: Array2<f64>,
        /// Synthetic-gradient weight on the label.
        b_mat: Array2<f64>,
        /// Synthetic-gradient bias.
        c_vec: Array1<f64>,
        /// Bootstrapped target, smoothed across steps.
        prev_target: Array1<f64>,
        /// Outer-loop step counter (governs the warm-up window).
        step: usize,
        /// DNIb's learned approximate Jacobian, if present.
        j_mat: Option<Array2<f64>>,
        /// DNIb's fixed random feedback weights, if present.
        w_fb: Option<Array2<f64>>,
    },
    /// KeRNL's per-unit timescale and eligibility trace.
    Kernl {
        /// Per-unit timescale, clamped to `[0, 1)`.
        kappa: Array1<f64>,
        /// `(H, H+I+1)` eligibility trace.
        sens: Array2<f64>,
        /// Last probe perturbation.
        perturbation: Array1<f64>,
    },
}
