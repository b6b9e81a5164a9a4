//! Built-in reference destinations
//!
//! Small, dependency-light sinks exercising the full `Destination`
//! contract. Production backends (HTTP collectors, message queues, SaaS
//! clients) implement the same trait outside this crate.

#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;
pub mod memory;

#[cfg(feature = "console")]
pub use console::ConsoleDestination;
#[cfg(feature = "file")]
pub use file::FileDestination;
pub use memory::{MemoryDestination, MemoryHandle};

use crate::core::event::LogEvent;

/// Default plain-text rendering shared by the built-in destinations.
/// Handles metric-only events (metric set, no message).
pub fn format_event(event: &LogEvent) -> String {
    let mut out = format!(
        "{} {:5} [{}] {}",
        event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        event.level.to_str(),
        event.thread_name,
        event.logger_name,
    );

    if !event.tags.is_empty() {
        out.push_str(" {");
        out.push_str(&event.tags.join(","));
        out.push('}');
    }

    if let Some(message) = &event.message {
        out.push_str(" -- ");
        out.push_str(message);
    }

    if let Some(duration) = event.duration {
        out.push_str(&format!(" ({duration:.1}ms)"));
    }

    if let Some(metric) = &event.metric {
        out.push_str(&format!(" metric={metric}"));
        if let Some(amount) = event.metric_amount {
            out.push_str(&format!(":{amount}"));
        }
    }

    if let Some(payload) = &event.payload {
        if let Ok(json) = serde_json::to_string(payload) {
            out.push_str(" | ");
            out.push_str(&json);
        }
    }

    if !event.named_tags.is_empty() {
        if let Ok(json) = serde_json::to_string(&event.named_tags) {
            out.push_str(" ~ ");
            out.push_str(&json);
        }
    }

    if let Some(exception) = &event.exception {
        out.push_str(&format!(" ! {}", exception.message));
        let mut cause = exception.cause.as_deref();
        while let Some(info) = cause {
            out.push_str(&format!(" <- {}", info.message));
            cause = info.cause.as_deref();
        }
    }

    out
}
