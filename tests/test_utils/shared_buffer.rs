//! Shared buffer utilities for concurrency tests.
//!
//! Provides a thread-safe buffer that a `StreamSink` can own while the test
//! keeps a handle for reading what was written.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Thread-safe wrapper around a byte buffer used by stream sinks.
///
/// The inner `Arc<Mutex<Vec<u8>>>` is kept private so tests can't
/// accidentally bypass the `Write` implementation.
#[derive(Clone, Default)]
pub struct SharedBuf {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("shared buffer lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Return everything written so far as UTF-8.
pub fn read_output(buf: &SharedBuf) -> String {
    let bytes = buf
        .buffer
        .lock()
        .expect("shared buffer lock poisoned")
        .clone();
    String::from_utf8(bytes).expect("sink output is UTF-8")
}
