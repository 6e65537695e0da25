//! Regex-based suppression of access lines.

use log::error;
use regex::Regex;

use crate::filters::{FilterBuildError, FilterBuilderTrait, LineFilter};

/// Suppresses lines matching a configured pattern anywhere in the line.
///
/// With no pattern nothing is suppressed.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    pattern: Option<Regex>,
}

impl Blacklist {
    /// A blacklist that never suppresses.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from an optional configured pattern, failing open.
    ///
    /// Blank patterns mean "no blacklist". A pattern that fails to compile
    /// is reported once and then ignored.
    pub fn from_pattern(pattern: Option<&str>) -> Self {
        let Some(pattern) = pattern else {
            return Self::none();
        };
        match BlacklistFilterBuilder::new().with_pattern(pattern).build_inner() {
            Ok(blacklist) => blacklist,
            Err(err) => {
                error!("accesslog: {err}; blacklist disabled");
                Self::none()
            }
        }
    }

    /// Whether `line` matches the configured pattern.
    pub fn is_suppressed(&self, line: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(line))
    }

    /// The compiled pattern text, if any.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }
}

impl LineFilter for Blacklist {
    fn should_log(&self, line: &str) -> bool {
        !self.is_suppressed(line)
    }
}

/// Builder for [`Blacklist`] that rejects invalid patterns.
#[derive(Clone, Debug, Default)]
pub struct BlacklistFilterBuilder {
    pattern: Option<String>,
}

impl BlacklistFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pattern to match against formatted lines.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

impl FilterBuilderTrait for BlacklistFilterBuilder {
    type Filter = Blacklist;

    fn build_inner(&self) -> Result<Self::Filter, FilterBuildError> {
        let Some(pattern) = self.pattern.as_deref().filter(|p| !p.trim().is_empty()) else {
            return Ok(Blacklist::none());
        };
        let regex = Regex::new(pattern).map_err(|source| FilterBuildError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Blacklist {
            pattern: Some(regex),
        })
    }
}
