//! Run-length collapsing of consecutive duplicate lines.
//!
//! The collapser is a single-writer state machine: callers must serialise
//! access (the [`crate::AccessLogger`] holds it behind its log lock).

use crate::formatter::{Fingerprint, FormattedLine};

/// Render the summary line emitted after a run of duplicates.
pub fn summary_line(duplicates: u64) -> String {
    format!(" + {duplicates} duplicates")
}

/// What the caller must write after observing a line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Emission {
    /// The line duplicated the previous one and is held back.
    Buffered,
    /// Write the line.
    Line(String),
    /// A run of duplicates ended: write `prior`, the summary for
    /// `duplicates`, then `line`.
    LineWithPriorSummary {
        prior: String,
        duplicates: u64,
        line: String,
    },
    /// Pending duplicates flushed at shutdown: write `prior` and the summary.
    Summary { prior: String, duplicates: u64 },
}

impl Emission {
    /// Lines to write, in order.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Buffered => Vec::new(),
            Self::Line(line) => vec![line],
            Self::LineWithPriorSummary {
                prior,
                duplicates,
                line,
            } => vec![prior, summary_line(duplicates), line],
            Self::Summary { prior, duplicates } => vec![prior, summary_line(duplicates)],
        }
    }
}

/// Coalesces consecutive lines sharing a [`Fingerprint`].
#[derive(Debug, Default)]
pub struct DuplicateCollapser {
    last: Option<Fingerprint>,
    previous_line: Option<String>,
    duplicates: u64,
}

impl DuplicateCollapser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next line.
    ///
    /// A line matching the previous fingerprint is held back and counted. A
    /// differing line releases the most recent held line plus a summary
    /// before being emitted itself.
    pub fn observe(&mut self, line: FormattedLine) -> Emission {
        if self.last == Some(line.fingerprint) {
            self.previous_line = Some(line.text);
            self.duplicates += 1;
            return Emission::Buffered;
        }

        self.last = Some(line.fingerprint);
        match self.take_pending() {
            Some((prior, duplicates)) => Emission::LineWithPriorSummary {
                prior,
                duplicates,
                line: line.text,
            },
            None => Emission::Line(line.text),
        }
    }

    /// Release any pending duplicate run.
    ///
    /// The fingerprint is forgotten as well, so the next line is always
    /// emitted.
    pub fn flush(&mut self) -> Option<Emission> {
        self.last = None;
        self.take_pending()
            .map(|(prior, duplicates)| Emission::Summary { prior, duplicates })
    }

    /// Number of duplicates currently held back.
    pub fn pending_duplicates(&self) -> u64 {
        self.duplicates
    }

    fn take_pending(&mut self) -> Option<(String, u64)> {
        let duplicates = std::mem::take(&mut self.duplicates);
        let prior = self.previous_line.take();
        match prior {
            Some(prior) if duplicates > 0 => Some((prior, duplicates)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{AccessLineFormatter, FormatOptions};
    use crate::request::{RequestFact, ResponseFact};
    use std::time::Duration;

    fn line(url: &str, elapsed_ms: u64) -> FormattedLine {
        AccessLineFormatter::default().format(
            &RequestFact::new("GET", url).with_host("x"),
            Some(&ResponseFact::new(200, 1)),
            Duration::from_millis(elapsed_ms),
            FormatOptions::default(),
        )
    }

    #[test]
    fn three_duplicates_then_different() {
        let mut c = DuplicateCollapser::new();
        let first = line("/a", 1);
        let second = line("/a", 2);
        let third = line("/a", 3);
        let other = line("/b", 4);

        let mut written = Vec::new();
        for l in [first.clone(), second, third.clone(), other.clone()] {
            written.extend(c.observe(l).into_lines());
        }

        assert_eq!(
            written,
            vec![
                first.text,
                third.text,
                " + 2 duplicates".to_owned(),
                other.text,
            ]
        );
        assert_eq!(c.pending_duplicates(), 0);
    }

    #[test]
    fn distinct_lines_pass_straight_through() {
        let mut c = DuplicateCollapser::new();
        let a = line("/a", 1);
        let b = line("/b", 1);
        assert_eq!(c.observe(a.clone()), Emission::Line(a.text));
        assert_eq!(c.observe(b.clone()), Emission::Line(b.text));
        assert_eq!(c.flush(), None);
    }

    #[test]
    fn flush_emits_pending_summary() {
        let mut c = DuplicateCollapser::new();
        c.observe(line("/a", 1));
        assert_eq!(c.observe(line("/a", 9)), Emission::Buffered);
        let last = line("/a", 9);
        assert_eq!(
            c.flush(),
            Some(Emission::Summary {
                prior: last.text,
                duplicates: 1
            })
        );
        assert_eq!(c.flush(), None);
        // Fingerprint was forgotten by the flush.
        assert!(matches!(c.observe(line("/a", 1)), Emission::Line(_)));
    }
}
