//! In-memory capture destination
//!
//! Records every delivered event and batch boundary; the cloneable
//! [`MemoryHandle`] lets tests and embedders inspect what arrived while the
//! worker owns the destination itself.

use crate::core::destination::Destination;
use crate::core::error::Result;
use crate::core::event::LogEvent;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Captured {
    events: Vec<LogEvent>,
    batch_sizes: Vec<usize>,
    flushes: usize,
    reopens: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct MemoryDestination {
    name: String,
    inner: Arc<Mutex<Captured>>,
}

impl MemoryDestination {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Captured::default())),
        }
    }

    /// Inspection handle, valid after the destination moves to its worker.
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Destination for MemoryDestination {
    fn log(&mut self, event: &LogEvent) -> Result<bool> {
        self.inner.lock().events.push(event.clone());
        Ok(true)
    }

    fn batch(&mut self, events: &[LogEvent]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.batch_sizes.push(events.len());
        inner.events.extend_from_slice(events);
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.lock().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.lock().closed = true;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.reopens += 1;
        inner.closed = false;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Cloneable view into a [`MemoryDestination`]'s captured state.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    inner: Arc<Mutex<Captured>>,
}

impl MemoryHandle {
    pub fn events(&self) -> Vec<LogEvent> {
        self.inner.lock().events.clone()
    }

    /// Messages of captured events, in delivery order; metric-only events
    /// contribute an empty string.
    pub fn messages(&self) -> Vec<String> {
        self.inner
            .lock()
            .events
            .iter()
            .map(|e| e.message.clone().unwrap_or_default())
            .collect()
    }

    /// Sizes of each `batch` call, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner.lock().batch_sizes.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }

    pub fn reopen_count(&self) -> usize {
        self.inner.lock().reopens
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
