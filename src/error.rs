//! Error types for the engine.
//!
//! Mirrors the two fatal error kinds laid out by the error-handling design:
//! a [`ConfigError`] raised once, before the time loop starts, and a
//! [`NumericError`] raised mid-run the instant a NaN or infinity is observed.
//! Neither kind is retried -- online learning is inherently sequential, and
//! a retry would just replay the same divergent step.
use std::fmt;

/// Fatal, pre-run configuration problems.
///
/// Raised by [`crate::rnn::RnnConfig::validate`], optimizer construction, and
/// [`crate::simulation::Simulation`] setup (including resolving monitor
/// paths, which this crate validates eagerly rather than silently skipping
/// unknown paths at run time).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A parameter tensor's shape is inconsistent with the others.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// An algorithm name in the configuration surface is not recognized.
    #[error("unknown learning algorithm: {0}")]
    UnknownAlgorithm(String),
    /// An option key or value is outside its valid domain.
    #[error("invalid option {key}: {reason}")]
    InvalidOption {
        /// Name of the offending option.
        key: String,
        /// Why the value is invalid.
        reason: String,
    },
    /// DNI/DNIb or KeRNL was configured without the inner optimizer they require.
    #[error("missing required inner optimizer for {0}")]
    MissingInnerOptimizer(String),
    /// A monitor's dotted path does not resolve to any known accessor.
    #[error("unresolvable monitor path: {0}")]
    UnknownMonitorPath(String),
}

/// Fatal, mid-run numeric failures.
///
/// Carries the step index and the name of the first monitor/quantity found
/// to be non-finite, per the error-handling design's requirement that a run
/// "halts and reports the step index and the first offending monitor."
#[derive(Debug, Clone)]
pub struct NumericError {
    /// Time step at which the non-finite value was observed.
    pub step: usize,
    /// Name of the offending quantity (e.g. `"net.loss_"`, `"learn_alg.A"`).
    pub source: String,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "non-finite value in `{}` at step {}",
            self.source, self.step
        )
    }
}

impl std::error::Error for NumericError {}

/// Errors a full simulation run can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Configuration was invalid at setup time.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A numeric divergence halted the run.
    #[error(transparent)]
    Numeric(#[from] NumericError),
}
