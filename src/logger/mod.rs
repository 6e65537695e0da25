//! Access logger orchestrating formatting, filtering, collapsing and output.
//!
//! [`AccessLogger`] is invoked once per completed request. Each call runs
//! format → filters → collapse → sink writes → console publish while holding
//! the logger's log lock, so sink output follows lock order and the
//! collapser state is never mutated concurrently.

mod toggles;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::{
    collapser::{DuplicateCollapser, Emission},
    event_stream::{CappedEventStream, Subscriber},
    filters::{Blacklist, LineFilter},
    formatter::{AccessLineFormatter, FormatOptions},
    rate_limited_warner::RateLimitedWarner,
    request::{RequestFact, ResponseFact},
    sink::{LineSink, SinkError},
};

pub use toggles::Toggles;

/// Result of a single [`AccessLogger::log`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutcome {
    /// Logging is switched off; nothing happened.
    Disabled,
    /// The logger has been shut down.
    ShutDown,
    /// A filter rejected the line. Collapser state is untouched.
    Suppressed,
    /// The line duplicated the previous one and is held back.
    Collapsed,
    /// This many lines were emitted (the line itself plus any released
    /// duplicate run).
    Emitted(usize),
}

/// Per-instance access logger.
pub struct AccessLogger {
    formatter: AccessLineFormatter,
    enabled: AtomicBool,
    log_request_headers: AtomicBool,
    log_post: AtomicBool,
    log_response: AtomicBool,
    console_enabled: AtomicBool,
    blacklist: RwLock<Arc<Blacklist>>,
    filters: RwLock<Vec<Arc<dyn LineFilter>>>,
    sinks: RwLock<Vec<Arc<dyn LineSink>>>,
    /// The log lock. Every emission happens while it is held.
    collapser: Mutex<DuplicateCollapser>,
    events: CappedEventStream<String>,
    sink_failures: RateLimitedWarner,
    shut_down: AtomicBool,
}

impl AccessLogger {
    pub(crate) fn new(
        formatter: AccessLineFormatter,
        toggles: Toggles,
        blacklist: Blacklist,
        sinks: Vec<Arc<dyn LineSink>>,
        console_capacity: NonZeroUsize,
    ) -> Self {
        Self {
            formatter,
            enabled: AtomicBool::new(toggles.enabled),
            log_request_headers: AtomicBool::new(toggles.log_request_headers),
            log_post: AtomicBool::new(toggles.log_post),
            log_response: AtomicBool::new(toggles.log_response),
            console_enabled: AtomicBool::new(toggles.console_enabled),
            blacklist: RwLock::new(Arc::new(blacklist)),
            filters: RwLock::new(Vec::new()),
            sinks: RwLock::new(sinks),
            collapser: Mutex::new(DuplicateCollapser::new()),
            events: CappedEventStream::new(console_capacity),
            sink_failures: RateLimitedWarner::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Start configuring a logger.
    pub fn builder() -> crate::AccessLogConfigBuilder {
        crate::AccessLogConfigBuilder::new()
    }

    /// Log a completed request.
    ///
    /// `response` may be absent, in which case status and size render as
    /// `-`. Sink failures are reported through `log` and never surface here;
    /// a failing sink does not prevent other sinks or the console publish.
    pub fn log(
        &self,
        request: &RequestFact,
        response: Option<&ResponseFact>,
        elapsed: Duration,
    ) -> LogOutcome {
        if !self.enabled.load(Ordering::Relaxed) {
            return LogOutcome::Disabled;
        }

        let mut collapser = self.collapser.lock();
        if self.shut_down.load(Ordering::Acquire) {
            return LogOutcome::ShutDown;
        }

        let line = self
            .formatter
            .format(request, response, elapsed, self.format_options());
        if !self.passes_all_filters(&line.text) {
            return LogOutcome::Suppressed;
        }

        match collapser.observe(line) {
            Emission::Buffered => LogOutcome::Collapsed,
            emission => LogOutcome::Emitted(self.emit(emission)),
        }
    }

    /// Log a request, measuring elapsed time from its start timestamp.
    pub fn log_completed(&self, request: &RequestFact, response: Option<&ResponseFact>) -> LogOutcome {
        let elapsed = request.elapsed_since(SystemTime::now());
        self.log(request, response, elapsed)
    }

    /// Subscribe to lines published from now on.
    ///
    /// Lines are only published while the console is enabled.
    pub fn subscribe(&self) -> Subscriber<String> {
        self.events.subscribe()
    }

    /// Subscribe starting from the oldest line still retained.
    pub fn subscribe_from_oldest(&self) -> Subscriber<String> {
        self.events.subscribe_from_oldest()
    }

    /// The console stream lines are published into.
    pub fn events(&self) -> &CappedEventStream<String> {
        &self.events
    }

    pub fn formatter(&self) -> &AccessLineFormatter {
        &self.formatter
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, flag: bool) {
        self.enabled.store(flag, Ordering::Relaxed);
    }

    pub fn log_request_headers(&self) -> bool {
        self.log_request_headers.load(Ordering::Relaxed)
    }

    pub fn set_log_request_headers(&self, flag: bool) {
        self.log_request_headers.store(flag, Ordering::Relaxed);
    }

    pub fn log_post(&self) -> bool {
        self.log_post.load(Ordering::Relaxed)
    }

    pub fn set_log_post(&self, flag: bool) {
        self.log_post.store(flag, Ordering::Relaxed);
    }

    pub fn log_response(&self) -> bool {
        self.log_response.load(Ordering::Relaxed)
    }

    pub fn set_log_response(&self, flag: bool) {
        self.log_response.store(flag, Ordering::Relaxed);
    }

    pub fn console_enabled(&self) -> bool {
        self.console_enabled.load(Ordering::Relaxed)
    }

    pub fn set_console_enabled(&self, flag: bool) {
        self.console_enabled.store(flag, Ordering::Relaxed);
    }

    /// Snapshot of every runtime toggle.
    pub fn toggles(&self) -> Toggles {
        Toggles {
            enabled: self.is_enabled(),
            log_request_headers: self.log_request_headers(),
            log_post: self.log_post(),
            log_response: self.log_response(),
            console_enabled: self.console_enabled(),
        }
    }

    /// Apply every toggle at once.
    ///
    /// Collapser state is kept, so a duplicate run spanning the change is
    /// still summarised.
    pub fn apply_toggles(&self, toggles: Toggles) {
        self.set_enabled(toggles.enabled);
        self.set_log_request_headers(toggles.log_request_headers);
        self.set_log_post(toggles.log_post);
        self.set_log_response(toggles.log_response);
        self.set_console_enabled(toggles.console_enabled);
    }

    /// The active blacklist.
    pub fn blacklist(&self) -> Arc<Blacklist> {
        Arc::clone(&self.blacklist.read())
    }

    /// Replace the blacklist pattern. Invalid patterns disable the blacklist.
    pub fn set_blacklist(&self, pattern: Option<&str>) {
        *self.blacklist.write() = Arc::new(Blacklist::from_pattern(pattern));
    }

    /// Attach an additional filter, consulted after the blacklist.
    pub fn add_filter(&self, filter: Arc<dyn LineFilter>) {
        self.filters.write().push(filter);
    }

    pub fn remove_filter(&self, filter: &Arc<dyn LineFilter>) -> bool {
        let mut filters = self.filters.write();
        if let Some(pos) = filters.iter().position(|f| Arc::ptr_eq(f, filter)) {
            filters.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn clear_filters(&self) {
        self.filters.write().clear();
    }

    /// Attach a sink. Lines emitted afterwards are written to it.
    pub fn add_sink(&self, sink: Arc<dyn LineSink>) {
        self.sinks.write().push(sink);
    }

    /// Detach a sink previously added to this logger.
    pub fn remove_sink(&self, sink: &Arc<dyn LineSink>) -> bool {
        let mut sinks = self.sinks.write();
        if let Some(pos) = sinks.iter().position(|s| Arc::ptr_eq(s, sink)) {
            sinks.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn clear_sinks(&self) {
        self.sinks.write().clear();
    }

    /// Flush every sink. Returns `true` if all of them succeeded.
    pub fn flush(&self) -> bool {
        let sinks = self.sinks.read().clone();
        sinks.iter().fold(true, |ok, sink| sink.flush() && ok)
    }

    /// Number of duplicates currently held back by the collapser.
    pub fn pending_duplicates(&self) -> u64 {
        self.collapser.lock().pending_duplicates()
    }

    /// Release any pending duplicate summary, flush sinks and close the
    /// console stream.
    ///
    /// Subscribers drain what they have not read yet and then observe the
    /// stream as closed. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        {
            let mut collapser = self.collapser.lock();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                return;
            }
            if let Some(emission) = collapser.flush() {
                self.emit(emission);
            }
        }
        if !self.flush() {
            warn!("AccessLogger: one or more sinks failed to flush during shutdown");
        }
        self.sink_failures.flush(|count| {
            warn!("AccessLogger: {count} sink writes failed");
        });
        self.events.close();
        debug!("AccessLogger: shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn format_options(&self) -> FormatOptions {
        FormatOptions::default()
            .with_request_headers(self.log_request_headers())
            .with_post(self.log_post())
            .with_response(self.log_response())
    }

    fn passes_all_filters(&self, line: &str) -> bool {
        if self.blacklist.read().is_suppressed(line) {
            return false;
        }
        self.filters.read().iter().all(|f| f.should_log(line))
    }

    /// Write an emission to every sink and, if enabled, the console.
    ///
    /// Must be called with the log lock held.
    fn emit(&self, emission: Emission) -> usize {
        let lines = emission.into_lines();
        let sinks = self.sinks.read().clone();
        let publish = self.console_enabled();
        for line in &lines {
            for sink in &sinks {
                match sink.write_line(line) {
                    Ok(()) => {}
                    // The sink counts and reports its own queue overflows.
                    Err(SinkError::QueueFull) => {}
                    Err(err) => {
                        debug!("AccessLogger: sink write failed: {err}");
                        self.sink_failures.record_lost_line();
                        self.sink_failures.warn_if_due(|count| {
                            warn!("AccessLogger: {count} sink writes failed; latest: {err}");
                        });
                    }
                }
            }
            if publish {
                self.events.publish(line.clone());
            }
        }
        lines.len()
    }
}

impl Default for AccessLogger {
    /// Enabled logger writing through [`crate::LogSink`] with the default
    /// format and the console disabled.
    fn default() -> Self {
        Self::new(
            AccessLineFormatter::default(),
            Toggles::default(),
            Blacklist::none(),
            vec![Arc::new(crate::LogSink::new())],
            crate::event_stream::default_capacity(),
        )
    }
}

impl fmt::Debug for AccessLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogger")
            .field("format", &self.formatter.template().source())
            .field("toggles", &self.toggles())
            .field("blacklist", &self.blacklist.read().pattern())
            .field("sinks", &self.sinks.read().len())
            .field("events", &self.events)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Drop for AccessLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod logger_tests;
