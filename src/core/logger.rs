//! Logger front-end
//!
//! The per-call-site facade: gates on level and filter, constructs the
//! immutable event, and hands it to the registry. Past the enqueue point
//! delivery is fire-and-forget; nothing a destination does can raise into
//! the producer.

use super::event::Record;
use super::filter::LogFilter;
use super::level::LogLevel;
use super::registry::Registry;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct Logger {
    name: String,
    /// Instance-level override; falls back to the registry default.
    level: Option<LogLevel>,
    filter: Option<LogFilter>,
    registry: Arc<Registry>,
}

impl Logger {
    pub fn new(name: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            name: name.into(),
            level: None,
            filter: None,
            registry,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn set_level(&mut self, level: Option<LogLevel>) {
        self.level = level;
    }

    /// Instance level if set, else the process-wide default.
    pub fn effective_level(&self) -> LogLevel {
        self.level.unwrap_or_else(|| self.registry.default_level())
    }

    /// Cheap early-exit guard for expensive argument construction.
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.effective_level()
    }

    /// Gate, construct and publish. Returns false when the event was
    /// suppressed by the level gate, a `min_duration` threshold or the
    /// logger's filter. `min_duration` only applies to records that carry a
    /// measured `duration`; a record without one is published regardless.
    pub fn log_with(&self, level: LogLevel, record: Record) -> bool {
        if !self.enabled(level) {
            return false;
        }
        // min_duration suppression happens before any destination work
        if let (Some(min), Some(duration)) =
            (record.min_duration_threshold(), record.duration_value())
        {
            if duration < min {
                return false;
            }
        }
        let event = record.into_event(level, &self.name);
        if let Some(filter) = &self.filter {
            if !filter.accepts(&event) {
                return false;
            }
        }
        self.registry.publish(&event);
        true
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> bool {
        self.log_with(level, Record::new(message))
    }

    /// Build the record only when the level gate passes; the closure plays
    /// the role of a trailing block at the call site.
    pub fn log_lazy(&self, level: LogLevel, f: impl FnOnce() -> Record) -> bool {
        if !self.enabled(level) {
            return false;
        }
        self.log_with(level, f())
    }

    /// Time `f`, log the outcome and return the closure's own result
    /// unchanged. An `Err` is attached to the event as an exception and
    /// always logged (bypassing `min_duration`), optionally at
    /// `on_exception_level`; it then propagates to the caller exactly as if
    /// the wrapper were not there.
    pub fn measure<T, E, F>(
        &self,
        level: LogLevel,
        options: MeasureOptions,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        let started = Instant::now();
        let result = f();
        let duration = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => {
                let mut record = Record::new(&options.message).duration(duration);
                if let Some(min) = options.min_duration {
                    record = record.min_duration(min);
                }
                if let Some(payload) = options.payload.clone() {
                    record = record.payload(payload);
                }
                self.log_with(level, record);
            }
            Err(e) => {
                let level = options.on_exception_level.unwrap_or(level);
                let mut record = Record::new(&options.message).duration(duration).exception(e);
                if let Some(payload) = options.payload.clone() {
                    record = record.payload(payload);
                }
                self.log_with(level, record);
            }
        }
        result
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Trace, message)
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Debug, message)
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Info, message)
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Warn, message)
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Error, message)
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Fatal, message)
    }

    pub fn trace_with(&self, record: Record) -> bool {
        self.log_with(LogLevel::Trace, record)
    }

    pub fn debug_with(&self, record: Record) -> bool {
        self.log_with(LogLevel::Debug, record)
    }

    pub fn info_with(&self, record: Record) -> bool {
        self.log_with(LogLevel::Info, record)
    }

    pub fn warn_with(&self, record: Record) -> bool {
        self.log_with(LogLevel::Warn, record)
    }

    pub fn error_with(&self, record: Record) -> bool {
        self.log_with(LogLevel::Error, record)
    }

    pub fn fatal_with(&self, record: Record) -> bool {
        self.log_with(LogLevel::Fatal, record)
    }

    #[inline]
    pub fn trace_enabled(&self) -> bool {
        self.enabled(LogLevel::Trace)
    }

    #[inline]
    pub fn debug_enabled(&self) -> bool {
        self.enabled(LogLevel::Debug)
    }

    #[inline]
    pub fn info_enabled(&self) -> bool {
        self.enabled(LogLevel::Info)
    }

    #[inline]
    pub fn warn_enabled(&self) -> bool {
        self.enabled(LogLevel::Warn)
    }

    #[inline]
    pub fn error_enabled(&self) -> bool {
        self.enabled(LogLevel::Error)
    }

    #[inline]
    pub fn fatal_enabled(&self) -> bool {
        self.enabled(LogLevel::Fatal)
    }

    pub fn measure_trace<T, E, F>(
        &self,
        message: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        self.measure(LogLevel::Trace, MeasureOptions::new(message), f)
    }

    pub fn measure_debug<T, E, F>(
        &self,
        message: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        self.measure(LogLevel::Debug, MeasureOptions::new(message), f)
    }

    pub fn measure_info<T, E, F>(
        &self,
        message: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        self.measure(LogLevel::Info, MeasureOptions::new(message), f)
    }

    pub fn measure_warn<T, E, F>(
        &self,
        message: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        self.measure(LogLevel::Warn, MeasureOptions::new(message), f)
    }

    pub fn measure_error<T, E, F>(
        &self,
        message: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        self.measure(LogLevel::Error, MeasureOptions::new(message), f)
    }

    pub fn measure_fatal<T, E, F>(
        &self,
        message: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        self.measure(LogLevel::Fatal, MeasureOptions::new(message), f)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Options for [`Logger::measure`].
#[derive(Debug, Clone)]
pub struct MeasureOptions {
    pub message: String,
    /// Suppress the event when the measured duration (ms) is below this.
    /// An error bypasses the threshold.
    pub min_duration: Option<f64>,
    pub payload: Option<Map<String, Value>>,
    /// Level to emit at when the measured closure fails.
    pub on_exception_level: Option<LogLevel>,
}

impl MeasureOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            min_duration: None,
            payload: None,
            on_exception_level: None,
        }
    }

    #[must_use]
    pub fn min_duration(mut self, millis: f64) -> Self {
        self.min_duration = Some(millis);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn on_exception_level(mut self, level: LogLevel) -> Self {
        self.on_exception_level = Some(level);
        self
    }
}
