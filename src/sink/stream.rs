//! Sink writing lines to an `io::Write` on a background thread.
//!
//! Lines are forwarded over a bounded channel so the logging thread never
//! blocks on I/O. When the queue is full the line is dropped and counted.

use std::{
    io::{self, Write},
    sync::atomic::{AtomicU64, Ordering},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::warn;

use crate::rate_limited_warner::RateLimitedWarner;
use crate::sink::{LineSink, SinkError};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

enum SinkCommand {
    Line(String),
    Flush(Sender<()>),
}

/// Writes each line followed by `\n` to a stream owned by a worker thread.
pub struct StreamSink {
    tx: Option<Sender<SinkCommand>>,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    dropped: AtomicU64,
    warner: RateLimitedWarner,
}

impl StreamSink {
    /// Sink writing to `stdout`.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Sink writing to `stderr`.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Sink writing to an arbitrary writer with the default queue capacity.
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::with_capacity(writer, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Sink with a custom queue capacity.
    pub fn with_capacity<W>(writer: W, capacity: usize) -> Self
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = bounded(capacity);
        let (done_tx, done_rx) = bounded(1);
        let handle = thread::spawn(move || {
            let mut writer = writer;
            for command in rx {
                match command {
                    SinkCommand::Line(line) => {
                        if writeln!(writer, "{line}").is_err() {
                            warn!("StreamSink write error");
                        }
                    }
                    SinkCommand::Flush(ack) => {
                        if writer.flush().is_err() {
                            warn!("StreamSink flush error");
                        }
                        let _ = ack.send(());
                    }
                }
            }
            if writer.flush().is_err() {
                warn!("StreamSink flush error during shutdown");
            }
            let _ = done_tx.send(());
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
            done_rx,
            dropped: AtomicU64::new(0),
            warner: RateLimitedWarner::new(),
        }
    }

    /// Number of lines dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LineSink for StreamSink {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let Some(tx) = &self.tx else {
            return Err(SinkError::Closed);
        };
        match tx.try_send(SinkCommand::Line(line.to_owned())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                self.warner.record_lost_line();
                self.warner.warn_if_due(|count| {
                    warn!("StreamSink: dropped {count} lines; queue full");
                });
                Err(SinkError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Closed),
        }
    }

    /// Wait until every queued line has been written and the writer flushed.
    fn flush(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx.send_timeout(SinkCommand::Flush(ack_tx), FLUSH_TIMEOUT).is_err() {
            return false;
        }
        ack_rx.recv_timeout(FLUSH_TIMEOUT).is_ok()
    }
}

impl Drop for StreamSink {
    fn drop(&mut self) {
        self.warner.flush(|count| {
            warn!("StreamSink: dropped {count} lines; queue full");
        });
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if self.done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err() {
                warn!("StreamSink: worker thread did not shut down within 1s");
                return;
            }
            if handle.join().is_err() {
                warn!("StreamSink: worker thread panicked");
            }
        }
    }
}
