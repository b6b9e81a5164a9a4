//! # Fanlog
//!
//! The delivery core of a structured logging library: events produced on
//! arbitrary application threads are fanned out asynchronously to one or
//! more independently failing, independently paced destinations, with
//! bounded memory, per-destination FIFO ordering, lag detection and
//! synchronous flush/close semantics.
//!
//! ## Layout
//!
//! - Each registered destination gets a dedicated queue and worker thread.
//! - Destinations receive events one at a time (immediate mode) or in
//!   size/time-bounded chunks (batched mode).
//! - `flush`/`close` ride the same FIFO queue as events, so their
//!   rendezvous completes only after everything enqueued before them.
//! - A misbehaving destination retries with linear backoff, then degrades
//!   silently; siblings and producers are never affected.
//!
//! ## Example
//!
//! ```
//! use fanlog::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! let destination = MemoryDestination::new("audit");
//! let captured = destination.handle();
//! registry
//!     .add(
//!         Box::new(destination),
//!         DeliveryMode::Immediate,
//!         ProcessorConfig::default(),
//!     )
//!     .unwrap();
//!
//! let logger = Logger::new("app", Arc::clone(&registry));
//! logger.info("service started");
//! registry.flush_all();
//!
//! assert_eq!(captured.messages(), ["service started"]);
//! ```

pub mod core;
pub mod destinations;
pub mod macros;

pub mod prelude {
    pub use crate::core::{
        DeliveryMode, Destination, DestinationId, Error, LogEvent, LogFilter, LogLevel, Logger,
        MeasureOptions, ProcessorConfig, ProcessorState, Record, Registry, Result,
    };
    #[cfg(feature = "console")]
    pub use crate::destinations::ConsoleDestination;
    #[cfg(feature = "file")]
    pub use crate::destinations::FileDestination;
    pub use crate::destinations::{MemoryDestination, MemoryHandle};
}

pub use crate::core::{
    context, Command, CommandKind, DeliveryMode, Destination, DestinationFactories, DestinationId,
    DiagnosticSink, Error, ExceptionInfo, LogEvent, LogFilter, LogLevel, Logger, MeasureOptions,
    MemoryDiagnostics, ProcessorConfig, ProcessorMetrics, ProcessorState, QueueItem,
    QueueProcessor, Record, Registry, Result, StderrDiagnostics,
};
#[cfg(feature = "console")]
pub use crate::destinations::ConsoleDestination;
#[cfg(feature = "file")]
pub use crate::destinations::FileDestination;
pub use crate::destinations::{MemoryDestination, MemoryHandle};
