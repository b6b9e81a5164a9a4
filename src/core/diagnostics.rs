//! Internal self-diagnostics
//!
//! The pipeline must never raise into producers when a destination
//! misbehaves; instead it reports through a diagnostic sink. The default
//! sink writes to stderr. Tests inject [`MemoryDiagnostics`] to assert on
//! what was reported.

use super::level::LogLevel;
use parking_lot::Mutex;
use std::sync::Arc;

pub trait DiagnosticSink: Send + Sync {
    /// Report an internal condition. `source` names the component, e.g. the
    /// destination whose worker is complaining.
    fn report(&self, level: LogLevel, source: &str, message: &str);
}

/// Shared handle to the active diagnostic sink.
pub type SharedDiagnostics = Arc<dyn DiagnosticSink>;

/// Default sink: one stderr line per report.
#[derive(Debug, Default)]
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn report(&self, level: LogLevel, source: &str, message: &str) {
        eprintln!("[fanlog {:5}] {}: {}", level.to_str(), source, message);
    }
}

/// Capturing sink for tests and embedders that forward diagnostics.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<DiagnosticEntry>>,
}

#[derive(Debug, Clone)]
pub struct DiagnosticEntry {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

impl MemoryDiagnostics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries.lock().clone()
    }

    /// Any report at `level` or above containing `needle`?
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.level >= level && e.message.contains(needle))
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn report(&self, level: LogLevel, source: &str, message: &str) {
        self.entries.lock().push(DiagnosticEntry {
            level,
            source: source.to_string(),
            message: message.to_string(),
        });
    }
}
