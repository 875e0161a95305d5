//! Job catalogue and runner.
//!
//! A [`job::Job`] describes one transformation. [`runner::run_job`] opens the inputs, builds
//! the transform chain and audio, negotiates the output and reports a single
//! [`job::JobOutcome`].

/// Job descriptions, warnings and outcomes.
pub mod job;
/// Executes jobs.
pub mod runner;
