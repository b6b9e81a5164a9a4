//! Fan-out registry
//!
//! The registry owns the ordered set of active destinations and routes every
//! published event to each of their queue processors. Destinations fail
//! independently: trouble in one worker never blocks delivery to siblings.

use super::destination::Destination;
use super::diagnostics::{SharedDiagnostics, StderrDiagnostics};
use super::error::{Error, Result};
use super::event::LogEvent;
use super::level::LogLevel;
use super::processor::{DeliveryMode, ProcessorConfig, QueueProcessor};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle to a registered destination, returned by [`Registry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationId(u64);

struct Registered {
    id: DestinationId,
    processor: Arc<QueueProcessor>,
}

pub struct Registry {
    destinations: RwLock<Vec<Registered>>,
    default_level: RwLock<LogLevel>,
    next_id: AtomicU64,
    diagnostics: SharedDiagnostics,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(StderrDiagnostics))
    }

    pub fn with_diagnostics(diagnostics: SharedDiagnostics) -> Self {
        Self {
            destinations: RwLock::new(Vec::new()),
            default_level: RwLock::new(LogLevel::Info),
            next_id: AtomicU64::new(1),
            diagnostics,
        }
    }

    /// Process-wide default level, used by loggers without an instance
    /// level of their own.
    pub fn default_level(&self) -> LogLevel {
        *self.default_level.read()
    }

    pub fn set_default_level(&self, level: LogLevel) {
        *self.default_level.write() = level;
    }

    pub fn diagnostics(&self) -> SharedDiagnostics {
        Arc::clone(&self.diagnostics)
    }

    /// Register a destination and start its worker. Fails fast on
    /// configuration problems: batched mode requires the destination to
    /// implement `batch`.
    pub fn add(
        &self,
        destination: Box<dyn Destination>,
        mode: DeliveryMode,
        config: ProcessorConfig,
    ) -> Result<DestinationId> {
        if mode == DeliveryMode::Batched && !destination.supports_batch() {
            return Err(Error::batch_unsupported(destination.name()));
        }
        config.validate()?;

        let id = DestinationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let processor = Arc::new(QueueProcessor::new(
            destination,
            mode,
            config,
            Arc::clone(&self.diagnostics),
        ));
        processor.start();
        self.destinations.write().push(Registered { id, processor });
        Ok(id)
    }

    /// Detach a destination without closing it; the caller decides whether
    /// to flush/close the returned processor.
    pub fn remove(&self, id: DestinationId) -> Option<Arc<QueueProcessor>> {
        let mut destinations = self.destinations.write();
        let index = destinations.iter().position(|r| r.id == id)?;
        Some(destinations.remove(index).processor)
    }

    /// Processor handle for a registered destination.
    pub fn processor(&self, id: DestinationId) -> Option<Arc<QueueProcessor>> {
        self.destinations
            .read()
            .iter()
            .find(|r| r.id == id)
            .map(|r| Arc::clone(&r.processor))
    }

    pub fn len(&self) -> usize {
        self.destinations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.read().is_empty()
    }

    /// Fan one event out to every registered destination. Returns how many
    /// queues accepted it. Works from a point-in-time snapshot, so
    /// concurrent add/remove never invalidates an in-flight publish.
    pub fn publish(&self, event: &LogEvent) -> usize {
        let snapshot: Vec<Arc<QueueProcessor>> = self
            .destinations
            .read()
            .iter()
            .map(|r| Arc::clone(&r.processor))
            .collect();

        let mut accepted = 0;
        for processor in snapshot {
            if processor.enqueue(event.clone()) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Flush every destination, waiting for each rendezvous. Never
    /// short-circuits; returns true only if every flush was acknowledged.
    pub fn flush_all(&self) -> bool {
        self.for_each_processor(|p| p.flush())
    }

    /// Close every destination, waiting for each rendezvous. Never
    /// short-circuits; returns true only if every close was acknowledged.
    pub fn close_all(&self) -> bool {
        self.for_each_processor(|p| p.close())
    }

    fn for_each_processor(&self, op: impl Fn(&QueueProcessor) -> bool) -> bool {
        let snapshot: Vec<Arc<QueueProcessor>> = self
            .destinations
            .read()
            .iter()
            .map(|r| Arc::clone(&r.processor))
            .collect();

        let mut all_ok = true;
        for processor in snapshot {
            all_ok &= op(&processor);
        }
        all_ok
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        // flush-on-exit: drain and close whatever is still registered
        self.close_all();
    }
}
