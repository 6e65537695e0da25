//! Shared `logtest` capture for unit tests.
//!
//! `logtest::Logger::start` installs the global logger and may only run once
//! per process, so every test in the `--lib` binary shares one instance.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};

static CAPTURE: Lazy<Mutex<logtest::Logger>> = Lazy::new(|| Mutex::new(logtest::Logger::start()));

/// Lock the shared capture and discard records left over from earlier tests.
pub fn capture_logs() -> MutexGuard<'static, logtest::Logger> {
    let mut logger = CAPTURE.lock();
    while logger.pop().is_some() {}
    logger
}
