#![deny(missing_docs, trivial_casts, trivial_numeric_casts, unsafe_code, unused_import_braces, unused_qualifications)]

//! An online-learning engine for a discrete-time recurrent network: one
//! leaky-integrator RNN cell, a family of real-time credit-assignment
//! algorithms (exact RTRL and its truncated/stochastic/bootstrapped
//! approximations), a small optimizer family, and a simulation driver that
//! coordinates them step by step.

/// Error types for the engine.
pub mod error;
/// The activation and loss catalogue.
pub mod activation;
/// Dense vector/matrix primitives.
pub mod math;
/// The single seedable random generator shared by a run.
pub mod rng;
/// The RNN cell.
pub mod rnn;
/// The optimizer family.
pub mod optimizer;
/// The learning-algorithm family.
pub mod learning;
/// The simulation driver.
pub mod simulation;
