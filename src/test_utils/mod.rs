//! Test-only helpers shared across unit and integration tests.
//!
//! Compiled for unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

pub mod collecting_sink;

pub use collecting_sink::{CollectingSink, FailingSink};

#[cfg(test)]
mod log_capture;

#[cfg(test)]
pub use log_capture::capture_logs;
