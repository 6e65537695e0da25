//! Filtering components for formatted access lines.
//!
//! Provides the [`LineFilter`] trait along with the regex-based
//! [`Blacklist`] and a builder for constructing it strictly.

use std::sync::Arc;

use thiserror::Error;

pub mod blacklist;

pub use blacklist::{Blacklist, BlacklistFilterBuilder};

/// Trait implemented by all line filters.
///
/// Filters are `Send + Sync` so they can be shared across threads.
pub trait LineFilter: Send + Sync {
    /// Return `true` if `line` should be logged.
    fn should_log(&self, line: &str) -> bool;
}

/// Errors that may occur while building a filter.
#[derive(Debug, Error)]
pub enum FilterBuildError {
    /// The pattern did not compile.
    #[error("invalid blacklist pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Trait implemented by all filter builders.
pub trait FilterBuilderTrait: Send + Sync {
    type Filter: LineFilter + 'static;

    fn build_inner(&self) -> Result<Self::Filter, FilterBuildError>;

    fn build(&self) -> Result<Arc<dyn LineFilter>, FilterBuildError> {
        Ok(Arc::new(self.build_inner()?))
    }
}
