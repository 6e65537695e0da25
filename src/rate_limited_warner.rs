//! Throttled reporting of access lines that never reached a sink.
//!
//! A sink that keeps failing would otherwise produce one warning per request.
//! [`RateLimitedWarner`] tallies lost lines and hands the tally to a callback
//! at most once per interval; whatever is left is reported on shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between two reports of lost lines.
pub const WARN_RATE_LIMIT_SECS: u64 = 5;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Tally of lines lost by a sink, reported at a bounded rate.
pub struct RateLimitedWarner {
    last_report: AtomicU64,
    lost: AtomicU64,
    interval_secs: u64,
}

impl RateLimitedWarner {
    /// Report at most every [`WARN_RATE_LIMIT_SECS`]. The first loss is
    /// reported straight away.
    pub fn new() -> Self {
        Self::with_interval(WARN_RATE_LIMIT_SECS)
    }

    pub fn with_interval(interval_secs: u64) -> Self {
        Self {
            last_report: AtomicU64::new(now_secs().saturating_sub(interval_secs)),
            lost: AtomicU64::new(0),
            interval_secs,
        }
    }

    /// Count one line that a sink failed to take.
    pub fn record_lost_line(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Lines counted since the last report.
    pub fn pending(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    /// Hand the tally to `report` if the interval has elapsed and anything
    /// was lost.
    pub fn warn_if_due(&self, mut report: impl FnMut(u64)) {
        let now = now_secs();
        let prev = self.last_report.load(Ordering::Relaxed);
        if now.saturating_sub(prev) < self.interval_secs {
            return;
        }
        let lost = self.lost.swap(0, Ordering::Relaxed);
        if lost > 0 {
            report(lost);
            self.last_report.store(now, Ordering::Relaxed);
        }
    }

    /// Report whatever is outstanding, ignoring the interval.
    pub fn flush(&self, mut report: impl FnMut(u64)) {
        let lost = self.lost.swap(0, Ordering::Relaxed);
        if lost > 0 {
            report(lost);
            self.last_report.store(now_secs(), Ordering::Relaxed);
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new()
    }
}
