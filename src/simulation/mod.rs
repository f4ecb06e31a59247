//! The simulation driver: coordinates the RNN cell, a learning algorithm
//! (plus optional diagnostic comparison algorithms), an optimizer, and
//! monitor recording over a run.
//!
//! One step loop -- forward pass, backward/gradient step, optimizer
//! application, periodic reporting -- generalized from one minibatch of
//! independent examples to one continuous online trajectory with optional
//! per-trial resets.
pub mod monitor;

use std::collections::{BTreeMap, HashMap, VecDeque};

use ndarray::{Array1, Array2};

use crate::error::{ConfigError, NumericError, RunError};
use crate::learning::{AlgorithmConfig, CheckpointState, LearningAlgorithm};
use crate::math;
use crate::optimizer::{self, Optimizer, OptimizerConfig};
use crate::rng::Rng;
use crate::rnn::{Gradients, Rnn};

pub use monitor::{MonitorPath, MonitorValue};

/// Whether a run updates parameters or only observes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Apply the optimizer and let every algorithm accumulate learning
    /// state.
    Train,
    /// Forward pass and monitor recording only; no algorithm or parameter
    /// mutation.
    Test,
}

/// Every flag spec.md §6 lists under "Simulation flags", plus `seed` for the
/// run's single RNG.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// The algorithm whose emitted gradient actually updates parameters.
    pub algorithm: AlgorithmConfig,
    /// Algorithms run purely for diagnostic comparison (alignment monitors);
    /// never applied to parameters.
    pub comparison_algorithms: Vec<AlgorithmConfig>,
    /// The parameter update rule.
    pub optimizer: OptimizerConfig,
    /// L2 coefficient applied to every algorithm's recurrent weight (not
    /// bias) gradient.
    pub l2_reg: f64,
    /// Forward-pass noise standard deviation, `σ` in `h_t = ... + σ·ξ`.
    pub sigma: f64,
    /// Trial length in steps. `None` runs one continuous, never-reset
    /// trajectory.
    pub time_steps_per_trial: Option<usize>,
    /// Standard deviation for the `h` draw at each trial boundary. `None`
    /// uses [`Rnn::reset`]'s own default of `1/sqrt(H)`.
    pub reset_sigma: Option<f64>,
    /// Per-within-trial-position scale applied once to `loss_` and `error`
    /// after the forward pass, length equal to `time_steps_per_trial`.
    pub trial_lr_mask: Option<Vec<f64>>,
    /// Apply the optimizer only every `update_interval` steps.
    pub update_interval: usize,
    /// Step index from which all learning -- including every algorithm's
    /// own inner optimizer (DNI/DNIb/KeRNL) -- is frozen.
    pub t_stop_learning: Option<usize>,
    /// Evaluate held-out loss and update `best_net` every this many steps.
    /// Requires `test_data` to be passed to [`Simulation::run`].
    pub save_model_interval: Option<usize>,
    /// Snapshot the RNN and active algorithm state every this many steps.
    pub checkpoint_interval: Option<usize>,
    /// Log a progress line every this many steps.
    pub report_interval: Option<usize>,
    /// Gate for the `report_interval` progress line: when false, no
    /// per-step report is logged regardless of `report_interval`.
    pub verbose: bool,
    /// Include held-out argmax accuracy (one-hot `y` vs `y_hat`) in the
    /// `report_interval` progress line.
    pub check_accuracy: bool,
    /// Include `loss_` in the `report_interval` progress line.
    pub check_loss: bool,
    /// Dotted monitor paths, validated eagerly at [`Simulation::new`].
    pub monitors: Vec<String>,
    /// Seed for this run's single RNG.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> SimulationConfig {
        SimulationConfig {
            algorithm: AlgorithmConfig::Rtrl,
            comparison_algorithms: Vec::new(),
            optimizer: OptimizerConfig::Sgd { lr: 0.01 },
            l2_reg: 0.0,
            sigma: 0.0,
            time_steps_per_trial: None,
            reset_sigma: None,
            trial_lr_mask: None,
            update_interval: 1,
            t_stop_learning: None,
            save_model_interval: None,
            checkpoint_interval: None,
            report_interval: None,
            verbose: false,
            check_accuracy: false,
            check_loss: true,
            monitors: Vec::new(),
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Check every flag's domain, and that dependent flags are mutually
    /// consistent (e.g. `trial_lr_mask`'s length against
    /// `time_steps_per_trial`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval == 0 {
            return Err(ConfigError::InvalidOption {
                key: "update_interval".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        if self.l2_reg < 0.0 {
            return Err(ConfigError::InvalidOption {
                key: "l2_reg".to_owned(),
                reason: format!("must be non-negative, got {}", self.l2_reg),
            });
        }
        if self.sigma < 0.0 {
            return Err(ConfigError::InvalidOption {
                key: "sigma".to_owned(),
                reason: format!("must be non-negative, got {}", self.sigma),
            });
        }
        if let Some(t) = self.time_steps_per_trial {
            if t == 0 {
                return Err(ConfigError::InvalidOption {
                    key: "time_steps_per_trial".to_owned(),
                    reason: "must be positive".to_owned(),
                });
            }
        }
        match (&self.trial_lr_mask, self.time_steps_per_trial) {
            (Some(mask), Some(t)) if mask.len() != t => {
                return Err(ConfigError::InvalidOption {
                    key: "trial_lr_mask".to_owned(),
                    reason: format!("length {} must equal time_steps_per_trial {}", mask.len(), t),
                });
            }
            (Some(_), None) => {
                return Err(ConfigError::InvalidOption {
                    key: "trial_lr_mask".to_owned(),
                    reason: "requires time_steps_per_trial to be set".to_owned(),
                });
            }
            _ => {}
        }
        for (key, v) in [
            ("save_model_interval", self.save_model_interval),
            ("checkpoint_interval", self.checkpoint_interval),
            ("report_interval", self.report_interval),
        ] {
            if v == Some(0) {
                return Err(ConfigError::InvalidOption {
                    key: key.to_owned(),
                    reason: "must be positive".to_owned(),
                });
            }
        }
        self.optimizer.validate()?;
        Ok(())
    }
}

/// A deep copy of the RNN's parameters and the active algorithm's estimator
/// state at one step, per §4.4 "Checkpointing". Diagnostic comparison
/// algorithms are not snapshotted.
#[derive(Clone)]
pub struct Checkpoint {
    /// The RNN at this step.
    pub rnn: Rnn,
    /// The active algorithm's estimator state at this step.
    pub algorithm_state: CheckpointState,
}

/// The outcome of one [`Simulation::run`] call.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Every recorded monitor's trace, keyed by its dotted path string, in
    /// step order.
    pub monitor_traces: HashMap<String, Vec<MonitorValue>>,
    /// Mean `loss_` over every step of this run.
    pub mean_loss: f64,
    /// Number of steps run.
    pub steps_run: usize,
}

fn flatten_recurrent(g: &Gradients) -> Array1<f64> {
    let w_rec_flat = math::flatten_col_major(g.d_w_rec.view());
    let w_in_flat = math::flatten_col_major(g.d_w_in.view());
    math::concat(&[w_rec_flat.view(), w_in_flat.view(), g.d_b_rec.view()])
}

fn argmax(v: ndarray::ArrayView1<f64>) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn normalized_dot(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    if !math::all_finite1(a.view()) || !math::all_finite1(b.view()) {
        return f64::NAN;
    }
    let denom = math::norm1(a.view()) * math::norm1(b.view());
    if denom < 1e-300 {
        return f64::NAN;
    }
    a.dot(b) / denom
}

/// The full driver: an RNN, the algorithm that trains it, zero or more
/// comparison algorithms, an optimizer, and the monitor/checkpoint
/// bookkeeping around one run.
pub struct Simulation {
    /// The network being trained or evaluated.
    pub rnn: Rnn,
    learn_alg: Box<dyn LearningAlgorithm>,
    comparison_algs: Vec<Box<dyn LearningAlgorithm>>,
    optimizer: Box<dyn Optimizer>,
    rng: Rng,
    config: SimulationConfig,
    monitor_paths: Vec<MonitorPath>,
    rec_grad_buffers: HashMap<String, VecDeque<Array1<f64>>>,
    lag: usize,
    checkpoints: BTreeMap<usize, Checkpoint>,
    /// The best-scoring (by held-out loss) snapshot seen so far, tracked
    /// when `save_model_interval` is set and `test_data` is passed to
    /// [`Simulation::run`].
    pub best_net: Option<Rnn>,
    best_val_loss: f64,
    step: usize,
}

impl Simulation {
    /// Build a simulation around `rnn`, validating `config` and every
    /// algorithm/optimizer/monitor it names.
    pub fn new(rnn: Rnn, config: SimulationConfig) -> Result<Simulation, ConfigError> {
        config.validate()?;
        let mut rng = Rng::new(config.seed);

        let learn_alg = config.algorithm.build(rnn.n_hidden, rnn.n_in, rnn.n_out, &mut rng)?;
        let comparison_algs = config
            .comparison_algorithms
            .iter()
            .map(|c| c.build(rnn.n_hidden, rnn.n_in, rnn.n_out, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;
        let optimizer = optimizer::build(config.optimizer, rnn.n_hidden, rnn.n_in, rnn.n_out)?;
        let monitor_paths = config.monitors.iter().map(|s| MonitorPath::parse(s)).collect::<Result<Vec<_>, _>>()?;

        let lag = std::iter::once(learn_alg.t_truncation())
            .chain(comparison_algs.iter().map(|a| a.t_truncation()))
            .flatten()
            .max()
            .unwrap_or(1)
            .max(1);

        log::info!(
            "simulation ready: algorithm={}, comparisons={}, n_hidden={}, n_in={}, n_out={}",
            learn_alg.name(),
            comparison_algs.len(),
            rnn.n_hidden,
            rnn.n_in,
            rnn.n_out
        );

        Ok(Simulation {
            rnn,
            learn_alg,
            comparison_algs,
            optimizer,
            rng,
            config,
            monitor_paths,
            rec_grad_buffers: HashMap::new(),
            lag,
            checkpoints: BTreeMap::new(),
            best_net: None,
            best_val_loss: f64::INFINITY,
            step: 0,
        })
    }

    /// In-memory checkpoints recorded so far, keyed by step index.
    pub fn checkpoints(&self) -> &BTreeMap<usize, Checkpoint> {
        &self.checkpoints
    }

    /// The number of steps run so far across every call to [`Simulation::run`].
    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Restore the RNN and active algorithm state from a recorded
    /// checkpoint, discarding everything run since. Returns `false` if no
    /// checkpoint exists at `step`.
    pub fn restore_checkpoint(&mut self, step: usize) -> bool {
        match self.checkpoints.get(&step) {
            Some(cp) => {
                self.rnn = cp.rnn.clone();
                self.learn_alg.restore(cp.algorithm_state.clone());
                self.step = step;
                true
            }
            None => false,
        }
    }

    fn algorithm_names(&self) -> Vec<&'static str> {
        std::iter::once(self.learn_alg.name())
            .chain(self.comparison_algs.iter().map(|a| a.name()))
            .collect()
    }

    fn push_rec_grad(&mut self, name: &'static str, v: Array1<f64>) {
        let buf = self.rec_grad_buffers.entry(name.to_owned()).or_default();
        buf.push_back(v);
        while buf.len() > self.lag {
            buf.pop_front();
        }
    }

    fn buffer_sample(&self, name: &str) -> Option<&Array1<f64>> {
        let buf = self.rec_grad_buffers.get(name)?;
        if name.contains("BPTT") {
            buf.back()
        } else {
            buf.front()
        }
    }

    fn alignment_matrices(&self) -> Option<(Array2<f64>, Array2<f64>)> {
        let names = self.algorithm_names();
        if names.len() < 2 {
            return None;
        }
        let samples: Vec<Option<&Array1<f64>>> = names.iter().map(|n| self.buffer_sample(n)).collect();
        if samples.iter().any(|s| s.is_none()) {
            return None;
        }
        let n = names.len();
        let mut alignment = Array2::zeros((n, n));
        let mut weights = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                let vi = samples[i].unwrap();
                let vj = samples[j].unwrap();
                alignment[[i, j]] = normalized_dot(vi, vj);
                weights[[i, j]] = math::norm1(vi.view()) * math::norm1(vj.view());
            }
        }
        Some((alignment, weights))
    }

    fn resolve_monitor(&self, path: &MonitorPath, rec_grad_now: Option<&Array1<f64>>, alignment: &Option<(Array2<f64>, Array2<f64>)>) -> MonitorValue {
        match path.base() {
            "net.loss_" => path.reduce_scalar(self.rnn.loss_),
            "net.error" => path.reduce_vector(self.rnn.error.clone()),
            "net.a" => path.reduce_vector(self.rnn.a.clone()),
            "net.h" => path.reduce_vector(self.rnn.h.clone()),
            "net.y_hat" => path.reduce_vector(self.rnn.y_hat.clone()),
            "net.a_J" => path.reduce_matrix(self.rnn.a_j.clone()),
            "net.w_rec" => path.reduce_matrix(self.rnn.w_rec.clone()),
            "learn_alg.rec_grad" => match rec_grad_now {
                Some(v) => path.reduce_vector(v.clone()),
                None => MonitorValue::Scalar(f64::NAN),
            },
            "alignment_matrix" => match alignment {
                Some((m, _)) => path.reduce_matrix(m.clone()),
                None => MonitorValue::Scalar(f64::NAN),
            },
            "alignment_weights" => match alignment {
                Some((_, w)) => path.reduce_matrix(w.clone()),
                None => MonitorValue::Scalar(f64::NAN),
            },
            other => unreachable!("monitor path resolution missing a case for {}", other),
        }
    }

    /// Evaluate mean loss over `(x, y)` using the current parameters, with a
    /// fresh RNG and no learning or parameter mutation. Used internally by
    /// `save_model_interval` and exposed directly for held-out evaluation.
    pub fn evaluate_mean_loss(&self, x: &Array2<f64>, y: &Array2<f64>) -> f64 {
        let mut rnn = self.rnn.clone();
        let mut rng = Rng::new(self.config.seed ^ 0x5EED_BEEF);
        let n = x.nrows();
        let mut total = 0.0;
        for t in 0..n {
            if let Some(tspt) = self.config.time_steps_per_trial {
                if t % tspt == 0 {
                    rnn.reset(None, self.config.reset_sigma, &mut rng);
                }
            }
            let x_t = x.row(t).to_owned();
            let y_t = y.row(t).to_owned();
            rnn.next_state(&x_t, 0.0, &mut rng);
            rnn.z_out(&y_t);
            total += rnn.loss_;
        }
        total / (n.max(1) as f64)
    }

    /// Run the driver over inputs `x` (`n_steps × n_in`) and labels `y`
    /// (`n_steps × n_out`) in `mode`. `test_data`, if given, is used for
    /// `save_model_interval`'s held-out evaluation; it is an error to set
    /// `save_model_interval` without providing it.
    pub fn run(&mut self, x: &Array2<f64>, y: &Array2<f64>, mode: Mode, test_data: Option<(&Array2<f64>, &Array2<f64>)>) -> Result<RunOutput, RunError> {
        if self.config.save_model_interval.is_some() && test_data.is_none() && mode == Mode::Train {
            return Err(ConfigError::InvalidOption {
                key: "save_model_interval".to_owned(),
                reason: "requires test_data to be passed to run()".to_owned(),
            }
            .into());
        }
        if x.nrows() != y.nrows() {
            return Err(ConfigError::DimensionMismatch(format!("x has {} rows, y has {} rows", x.nrows(), y.nrows())).into());
        }

        let n_steps = x.nrows();
        let mut monitor_traces: HashMap<String, Vec<MonitorValue>> = self.monitor_paths.iter().map(|p| (p.raw.clone(), Vec::with_capacity(n_steps))).collect();
        let mut loss_sum = 0.0;
        let wants_alignment = self.monitor_paths.iter().any(|p| p.wants_alignment_matrix() || p.wants_alignment_weights());
        let wants_rec_grad = self.monitor_paths.iter().any(|p| p.wants_rec_grad());

        if n_steps > 0 {
            self.rnn.y_prev = y.row(0).to_owned();
        }

        for t in 0..n_steps {
            if let Some(tspt) = self.config.time_steps_per_trial {
                if t % tspt == 0 {
                    self.rnn.reset(None, self.config.reset_sigma, &mut self.rng);
                    self.learn_alg.reset_learning();
                    for c in &mut self.comparison_algs {
                        c.reset_learning();
                    }
                }
            }

            let x_t = x.row(t).to_owned();
            let y_t = y.row(t).to_owned();
            self.rnn.next_state(&x_t, self.config.sigma, &mut self.rng);
            self.rnn.z_out(&y_t);

            if let Some(mask) = &self.config.trial_lr_mask {
                let tspt = self.config.time_steps_per_trial.expect("validated alongside trial_lr_mask");
                let scale = mask[t % tspt];
                self.rnn.loss_ *= scale;
                self.rnn.error.mapv_inplace(|e| e * scale);
            }

            self.rnn.get_a_jacobian();

            let learning_active = mode == Mode::Train && self.config.t_stop_learning.map_or(true, |tsl| t < tsl);

            if learning_active {
                self.learn_alg.update_learning_vars(&self.rnn, &mut self.rng);
                for c in &mut self.comparison_algs {
                    c.update_learning_vars(&self.rnn, &mut self.rng);
                }
            }

            let mut active_grad = self.learn_alg.emit_gradients(&self.rnn);
            active_grad.add_l2(&self.rnn.w_rec, &self.rnn.w_in, &self.rnn.w_out, self.config.l2_reg);
            let active_name = self.learn_alg.name();
            let active_rec_flat = flatten_recurrent(&active_grad);
            self.push_rec_grad(active_name, active_rec_flat.clone());

            for i in 0..self.comparison_algs.len() {
                let mut g = self.comparison_algs[i].emit_gradients(&self.rnn);
                g.add_l2(&self.rnn.w_rec, &self.rnn.w_in, &self.rnn.w_out, self.config.l2_reg);
                let name = self.comparison_algs[i].name();
                let flat = flatten_recurrent(&g);
                if !math::all_finite1(flat.view()) {
                    log::warn!("comparison algorithm {} diverged at step {}", name, t);
                }
                self.push_rec_grad(name, flat);
            }

            let alignment = if wants_alignment { self.alignment_matrices() } else { None };

            if mode == Mode::Train && learning_active && t % self.config.update_interval == 0 {
                self.optimizer.apply(&mut self.rnn, &active_grad);
            }

            if !self.rnn.is_finite() {
                return Err(NumericError {
                    step: t,
                    source: "net".to_owned(),
                }
                .into());
            }
            if !active_grad.all_finite() {
                return Err(NumericError {
                    step: t,
                    source: format!("learn_alg({}).rec_grad", active_name),
                }
                .into());
            }

            if mode == Mode::Train {
                if let Some(ci) = self.config.checkpoint_interval {
                    if t % ci == 0 {
                        self.checkpoints.insert(
                            t,
                            Checkpoint {
                                rnn: self.rnn.clone(),
                                algorithm_state: self.learn_alg.checkpoint(),
                            },
                        );
                    }
                }

                if let (Some(smi), Some((x_test, y_test))) = (self.config.save_model_interval, test_data) {
                    if t % smi == 0 {
                        let val_loss = self.evaluate_mean_loss(x_test, y_test);
                        if val_loss < self.best_val_loss {
                            self.best_val_loss = val_loss;
                            self.best_net = Some(self.rnn.clone());
                        }
                    }
                }

                if self.config.verbose {
                    if let Some(ri) = self.config.report_interval {
                        if t % ri == 0 {
                            let mut line = format!("step {}/{}", t, n_steps);
                            if self.config.check_loss {
                                line.push_str(&format!(": loss_={:.6}", self.rnn.loss_));
                            }
                            if self.config.check_accuracy {
                                let matched = argmax(self.rnn.y_hat.view()) == argmax(self.rnn.y.view());
                                line.push_str(&format!(", accuracy={}", matched as u8 as f64));
                            }
                            log::info!("{}", line);
                        }
                    }
                }
            }

            let rec_grad_now = if wants_rec_grad { self.buffer_sample(active_name).cloned() } else { None };
            for path in &self.monitor_paths {
                let value = self.resolve_monitor(path, rec_grad_now.as_ref(), &alignment);
                monitor_traces.get_mut(&path.raw).unwrap().push(value);
            }

            loss_sum += self.rnn.loss_;
            self.rnn.y_prev.assign(&self.rnn.y);
            self.step = t + 1;
        }

        Ok(RunOutput {
            monitor_traces,
            mean_loss: loss_sum / (n_steps.max(1) as f64),
            steps_run: n_steps,
        })
    }
}
