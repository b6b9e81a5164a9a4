//! Event filters
//!
//! A filter is either a pattern over the logger name or an arbitrary
//! predicate over the whole event. The front-end evaluates its filter once
//! as a cheap early exit; each destination evaluates its own filter again,
//! independently, since a destination may be stricter.

use super::event::LogEvent;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate type for [`LogFilter::Callable`].
pub type FilterFn = Arc<dyn Fn(&LogEvent) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum LogFilter {
    /// Accept events whose `logger_name` matches the pattern.
    Name(Regex),
    /// Accept events for which the predicate returns true.
    Callable(FilterFn),
}

impl LogFilter {
    /// Build a logger-name filter from a regex pattern.
    pub fn name(pattern: &str) -> Result<Self, regex::Error> {
        Ok(LogFilter::Name(Regex::new(pattern)?))
    }

    /// Build a predicate filter.
    pub fn callable<F>(predicate: F) -> Self
    where
        F: Fn(&LogEvent) -> bool + Send + Sync + 'static,
    {
        LogFilter::Callable(Arc::new(predicate))
    }

    /// Does this filter accept the event?
    pub fn accepts(&self, event: &LogEvent) -> bool {
        match self {
            LogFilter::Name(pattern) => pattern.is_match(&event.logger_name),
            LogFilter::Callable(predicate) => predicate(event),
        }
    }
}

impl fmt::Debug for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFilter::Name(pattern) => f.debug_tuple("Name").field(&pattern.as_str()).finish(),
            LogFilter::Callable(_) => f.debug_tuple("Callable").finish(),
        }
    }
}
