//! Durable destinations for formatted access lines.
//!
//! The logger writes every emitted line to each configured [`LineSink`].
//! Sink failures are reported by the logger and never abort logging.

use std::io;

use log::{info, log_enabled};
use thiserror::Error;

pub mod stream;
#[cfg(feature = "tracing-compat")]
pub mod tracing_sink;

pub use stream::StreamSink;
#[cfg(feature = "tracing-compat")]
pub use tracing_sink::TracingSink;

/// Target used by [`LogSink`] unless another is configured.
pub const DEFAULT_LOG_TARGET: &str = "accesslog";

/// Errors reported by sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's queue is full; the line was dropped.
    #[error("sink queue full, line dropped")]
    QueueFull,
    /// The sink has shut down.
    #[error("sink is shut down")]
    Closed,
    /// Writing to the underlying destination failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Trait implemented by all line sinks.
///
/// Sinks are shared across request threads, so implementations must be
/// `Send + Sync` and should not block for long.
pub trait LineSink: Send + Sync {
    /// Write one line.
    fn write_line(&self, line: &str) -> Result<(), SinkError>;

    /// Flush buffered output. Returns `true` on success.
    fn flush(&self) -> bool {
        true
    }
}

/// Writes lines through the `log` facade at `INFO` level.
///
/// This is the application-wide sink: whatever logger the host installed
/// decides where lines end up.
#[derive(Clone, Debug)]
pub struct LogSink {
    target: String,
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_target(DEFAULT_LOG_TARGET)
    }

    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSink for LogSink {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        if log_enabled!(target: &self.target, log::Level::Info) {
            info!(target: &self.target, "{line}");
        }
        Ok(())
    }

    fn flush(&self) -> bool {
        log::logger().flush();
        true
    }
}
