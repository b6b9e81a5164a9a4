//! Destination contract
//!
//! A destination is a concrete sink for log events: a file, a network
//! service, a batching API. The pipeline guarantees that a destination is
//! only ever driven by its single dedicated worker thread, so
//! implementations own their state without internal locking (`Send`, not
//! `Sync`).

use super::error::{Error, Result};
use super::event::LogEvent;

pub trait Destination: Send {
    /// Deliver one event. The returned bool indicates acceptance (e.g. an
    /// event dropped by backend-side sampling), not transport success.
    fn log(&mut self, event: &LogEvent) -> Result<bool>;

    /// Deliver a batch of events in order. Only called when the destination
    /// was registered in batched mode; registration fails fast when
    /// [`Destination::supports_batch`] is false.
    fn batch(&mut self, _events: &[LogEvent]) -> Result<()> {
        Err(Error::batch_unsupported(self.name()))
    }

    /// Advertises whether [`Destination::batch`] is implemented.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Flush buffered data, if any.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources; the worker stops after this.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Re-establish resources, e.g. after a process fork or connection loss.
    fn reopen(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
