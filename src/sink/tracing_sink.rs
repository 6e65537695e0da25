//! Sink emitting lines as `tracing` events.

use crate::sink::{LineSink, SinkError};

/// Emits each line as an `INFO` event with target `accesslog`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        tracing::info!(target: "accesslog", "{line}");
        Ok(())
    }
}
