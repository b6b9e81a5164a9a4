//! Log event model
//!
//! A [`LogEvent`] is immutable once constructed. All merging of caller
//! arguments happens in the single construction step ([`Record::into_event`]),
//! which also snapshots the producing thread's context and stamps the
//! creation time.

use super::context;
use super::level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of `source()` unwraps when capturing an error chain.
/// Bounds pathological or cyclic cause chains.
pub const MAX_CAUSE_DEPTH: usize = 5;

/// One captured error in a cause chain.
///
/// `class_name` is only known for the top-level typed error; Rust erases the
/// concrete type of `Error::source()` causes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub class_name: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backtrace: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    /// Capture an error and up to [`MAX_CAUSE_DEPTH`] of its causes.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut messages = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            if messages.len() == MAX_CAUSE_DEPTH {
                break;
            }
            messages.push(cause.to_string());
            source = cause.source();
        }

        let mut chain: Option<Box<ExceptionInfo>> = None;
        for message in messages.into_iter().rev() {
            chain = Some(Box::new(ExceptionInfo {
                class_name: None,
                message,
                backtrace: Vec::new(),
                cause: chain,
            }));
        }

        ExceptionInfo {
            class_name: Some(std::any::type_name::<E>().to_string()),
            message: err.to_string(),
            backtrace: Vec::new(),
            cause: chain,
        }
    }

    /// Length of the chain including this entry.
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut cause = self.cause.as_deref();
        while let Some(info) = cause {
            len += 1;
            cause = info.cause.as_deref();
        }
        len
    }
}

/// Immutable record of one log occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub logger_name: String,
    pub thread_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    /// Elapsed time in milliseconds, set by measurement helpers or the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub named_tags: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<Vec<String>>,
}

impl LogEvent {
    /// Index of this event's level in the severity order; always derived
    /// from `level`, never stored separately.
    #[inline]
    pub fn level_index(&self) -> usize {
        self.level.index()
    }

    /// An event carrying a metric but no message, intended for numeric
    /// dashboards rather than text logs.
    pub fn is_metric_only(&self) -> bool {
        self.metric.is_some() && self.message.is_none()
    }

    /// Age of this event relative to `now`; zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.timestamp).to_std().unwrap_or_default()
    }
}

/// Reserved keys of [`Record::from_map`]; these set event fields directly
/// instead of landing in the payload.
const RESERVED_KEYS: [&str; 5] = [
    "message",
    "duration",
    "metric",
    "metric_amount",
    "min_duration",
];

/// Builder merging a message, payload, exception and keyword-style values
/// into one event. This is the only way a [`LogEvent`] is constructed.
#[derive(Debug, Clone, Default)]
pub struct Record {
    message: Option<String>,
    payload: Option<Map<String, Value>>,
    exception: Option<ExceptionInfo>,
    duration: Option<f64>,
    metric: Option<String>,
    metric_amount: Option<f64>,
    min_duration: Option<f64>,
    backtrace: Option<Vec<String>>,
}

impl Record {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A record with no message, e.g. for metric-only events.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Interpret a loose ordered map: reserved keys (`message`, `duration`,
    /// `metric`, `metric_amount`, `min_duration`) set the matching fields,
    /// everything else becomes payload.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut record = Self::default();
        let mut payload = Map::new();
        for (key, value) in map {
            match key.as_str() {
                "message" => record.message = value.as_str().map(String::from),
                "duration" => record.duration = value.as_f64(),
                "metric" => record.metric = value.as_str().map(String::from),
                "metric_amount" => record.metric_amount = value.as_f64(),
                "min_duration" => record.min_duration = value.as_f64(),
                _ => {
                    payload.insert(key, value);
                }
            }
        }
        if !payload.is_empty() {
            record.payload = Some(payload);
        }
        record
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Add one payload entry, keeping insertion order.
    #[must_use]
    pub fn payload_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Attach an error, capturing its cause chain.
    #[must_use]
    pub fn exception<E: std::error::Error>(mut self, err: &E) -> Self {
        self.exception = Some(ExceptionInfo::from_error(err));
        self
    }

    /// Attach an already-captured exception chain.
    #[must_use]
    pub fn exception_info(mut self, info: ExceptionInfo) -> Self {
        self.exception = Some(info);
        self
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn duration(mut self, millis: f64) -> Self {
        self.duration = Some(millis);
        self
    }

    /// Suppress emission entirely when `duration` is below this threshold
    /// (milliseconds). Checked before the event reaches the registry.
    #[must_use]
    pub fn min_duration(mut self, millis: f64) -> Self {
        self.min_duration = Some(millis);
        self
    }

    #[must_use]
    pub fn metric(mut self, name: impl Into<String>) -> Self {
        self.metric = Some(name.into());
        self
    }

    #[must_use]
    pub fn metric_amount(mut self, amount: f64) -> Self {
        self.metric_amount = Some(amount);
        self
    }

    /// Capture the current stack, independent of any exception.
    #[must_use]
    pub fn with_backtrace(mut self) -> Self {
        let captured = std::backtrace::Backtrace::force_capture();
        self.backtrace = Some(
            captured
                .to_string()
                .lines()
                .map(str::to_string)
                .collect(),
        );
        self
    }

    pub(crate) fn min_duration_threshold(&self) -> Option<f64> {
        self.min_duration
    }

    pub(crate) fn duration_value(&self) -> Option<f64> {
        self.duration
    }

    /// The single construction step: snapshot the thread context, stamp the
    /// creation time and freeze the event.
    pub fn into_event(self, level: LogLevel, logger_name: &str) -> LogEvent {
        let (thread_name, tags, named_tags) = context::snapshot();
        LogEvent {
            level,
            timestamp: Utc::now(),
            logger_name: logger_name.to_string(),
            thread_name,
            message: self.message.as_deref().map(sanitize_message),
            payload: self.payload,
            exception: self.exception,
            duration: self.duration,
            metric: self.metric,
            metric_amount: self.metric_amount,
            tags,
            named_tags,
            backtrace: self.backtrace,
        }
    }
}

/// Escape newlines, carriage returns and tabs so a crafted message cannot
/// forge additional log lines.
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Is `key` one of the reserved event-field keys of [`Record::from_map`]?
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}
