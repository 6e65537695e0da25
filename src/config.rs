//! Builder for configuring an [`AccessLogger`].
//!
//! The builder collects toggles, the blacklist pattern, the line format and
//! the sinks, then validates them in [`AccessLogConfigBuilder::build`].

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;

use crate::{
    event_stream::DEFAULT_STREAM_CAPACITY,
    filters::Blacklist,
    formatter::AccessLineFormatter,
    logger::{AccessLogger, Toggles},
    sink::{LineSink, LogSink},
    template::{FormatTemplate, TemplateError},
};

/// Errors that may occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value was out of range or otherwise unusable.
    #[error("invalid access log configuration: {0}")]
    InvalidConfig(String),
    /// The line format could not be parsed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The configuration file does not exist.
    #[error("{0} doesn't exist")]
    FileNotFound(String),
    /// The configuration file exists but holds no data.
    #[error("{0} is an empty file")]
    EmptyFile(String),
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The requested text encoding is not known.
    #[error("unknown encoding {0}")]
    UnknownEncoding(String),
    /// The file bytes are not valid in the requested encoding.
    #[error("{path} is not valid {encoding}")]
    Decode { path: String, encoding: String },
    /// The file is not valid INI.
    #[error("{path} is invalid: {message}")]
    Parse { path: String, message: String },
}

/// Builder for [`AccessLogger`].
#[derive(Clone)]
pub struct AccessLogConfigBuilder {
    enabled: bool,
    log_request_headers: bool,
    log_post: bool,
    log_response: bool,
    console_enabled: Option<bool>,
    dev_mode: bool,
    blacklist: Option<String>,
    format: Option<String>,
    console_capacity: usize,
    sinks: Vec<Arc<dyn LineSink>>,
}

impl Default for AccessLogConfigBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            log_request_headers: false,
            log_post: false,
            log_response: false,
            console_enabled: None,
            dev_mode: false,
            blacklist: None,
            format: None,
            console_capacity: DEFAULT_STREAM_CAPACITY,
            sinks: Vec::new(),
        }
    }
}

impl AccessLogConfigBuilder {
    /// Create a new `AccessLogConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, flag: bool) -> Self {
        self.enabled = flag;
        self
    }

    pub fn with_log_request_headers(mut self, flag: bool) -> Self {
        self.log_request_headers = flag;
        self
    }

    pub fn with_log_post(mut self, flag: bool) -> Self {
        self.log_post = flag;
        self
    }

    pub fn with_log_response(mut self, flag: bool) -> Self {
        self.log_response = flag;
        self
    }

    /// Enable or disable publishing to the console stream.
    ///
    /// When unset, the console follows [`Self::with_dev_mode`].
    pub fn with_console_enabled(mut self, flag: bool) -> Self {
        self.console_enabled = Some(flag);
        self
    }

    /// Mark the host as running in a development environment.
    pub fn with_dev_mode(mut self, flag: bool) -> Self {
        self.dev_mode = flag;
        self
    }

    /// Set the blacklist pattern. Blank patterns disable the blacklist.
    pub fn with_blacklist(mut self, pattern: impl Into<String>) -> Self {
        self.blacklist = Some(pattern.into());
        self
    }

    /// Set the line format. Defaults to [`crate::DEFAULT_FORMAT`].
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Number of lines the console stream retains.
    pub fn with_console_capacity(mut self, capacity: usize) -> Self {
        self.console_capacity = capacity;
        self
    }

    /// Add a sink. Without any sink the logger writes through [`LogSink`].
    pub fn with_sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace all sinks.
    pub fn with_sinks<I>(mut self, sinks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn LineSink>>,
    {
        self.sinks = sinks.into_iter().collect();
        self
    }

    /// Effective console flag after applying the dev-mode default.
    pub fn console_enabled(&self) -> bool {
        self.console_enabled.unwrap_or(self.dev_mode)
    }

    pub fn blacklist(&self) -> Option<&str> {
        self.blacklist.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Toggles the built logger starts with.
    pub fn toggles(&self) -> Toggles {
        Toggles {
            enabled: self.enabled,
            log_request_headers: self.log_request_headers,
            log_post: self.log_post,
            log_response: self.log_response,
            console_enabled: self.console_enabled(),
        }
    }

    /// Validate the configuration and construct the logger.
    ///
    /// An invalid blacklist pattern is reported through `log` and leaves
    /// the logger without a blacklist; it is not an error.
    pub fn build(&self) -> Result<AccessLogger, ConfigError> {
        let capacity = NonZeroUsize::new(self.console_capacity).ok_or_else(|| {
            ConfigError::InvalidConfig("console capacity must be greater than zero".into())
        })?;
        let template = match self.format.as_deref() {
            Some(format) => FormatTemplate::parse(format)?,
            None => FormatTemplate::default(),
        };
        let sinks = if self.sinks.is_empty() {
            vec![Arc::new(LogSink::new()) as Arc<dyn LineSink>]
        } else {
            self.sinks.clone()
        };
        Ok(AccessLogger::new(
            AccessLineFormatter::new(template),
            self.toggles(),
            Blacklist::from_pattern(self.blacklist.as_deref()),
            sinks,
            capacity,
        ))
    }
}

impl fmt::Debug for AccessLogConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogConfigBuilder")
            .field("toggles", &self.toggles())
            .field("dev_mode", &self.dev_mode)
            .field("blacklist", &self.blacklist)
            .field("format", &self.format)
            .field("console_capacity", &self.console_capacity)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
