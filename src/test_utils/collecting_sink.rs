//! In-memory sinks for asserting on written lines.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::sink::{LineSink, SinkError};

/// Sink that stores every line it receives for later inspection.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all lines received so far.
    pub fn collected(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl LineSink for CollectingSink {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        self.lines.lock().push(line.to_owned());
        Ok(())
    }
}

/// Sink whose writes always fail, counting the attempts.
#[derive(Clone, Debug, Default)]
pub struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LineSink for FailingSink {
    fn write_line(&self, _line: &str) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Io(io::Error::other("sink unavailable")))
    }

    fn flush(&self) -> bool {
        false
    }
}
