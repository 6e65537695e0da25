//! HTTP access logging.
//!
//! An [`AccessLogger`] turns each completed request into one line, drops
//! blacklisted lines, collapses runs of duplicates, writes the result to its
//! [`LineSink`]s and, when the console is enabled, publishes it into a
//! [`CappedEventStream`] that live subscribers can tail.

pub mod collapser;
pub mod config;
pub mod event_stream;
pub mod file_config;
pub mod filters;
pub mod formatter;
pub mod logger;
pub mod rate_limited_warner;
pub mod request;
pub mod sink;
pub mod template;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use collapser::{DuplicateCollapser, Emission};
pub use config::{AccessLogConfigBuilder, ConfigError};
pub use event_stream::{
    CappedEventStream, Event, RecvError, RecvTimeoutError, Subscriber, SubscriberCanceller,
    TryRecvError,
};
pub use filters::{Blacklist, BlacklistFilterBuilder, FilterBuildError, FilterBuilderTrait, LineFilter};
pub use formatter::{AccessLineFormatter, FormatOptions, FormattedLine, Fingerprint};
pub use logger::{AccessLogger, LogOutcome, Toggles};
pub use request::{Headers, RequestFact, ResponseFact};
pub use sink::{LineSink, LogSink, SinkError, StreamSink};
#[cfg(feature = "tracing-compat")]
pub use sink::TracingSink;
pub use template::{DEFAULT_FORMAT, FormatTemplate, Placeholder, TemplateError};
