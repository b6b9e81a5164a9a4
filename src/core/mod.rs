//! Core delivery pipeline types

pub mod command;
pub mod context;
pub mod destination;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod factory;
pub mod filter;
pub mod level;
pub mod logger;
pub mod metrics;
pub mod processor;
pub mod registry;

pub use command::{Command, CommandKind, QueueItem};
pub use context::{NamedTagGuard, TagGuard};
pub use destination::Destination;
pub use diagnostics::{
    DiagnosticEntry, DiagnosticSink, MemoryDiagnostics, SharedDiagnostics, StderrDiagnostics,
};
pub use error::{Error, Result};
pub use event::{ExceptionInfo, LogEvent, Record, MAX_CAUSE_DEPTH};
pub use factory::{DestinationCtor, DestinationFactories};
pub use filter::{FilterFn, LogFilter};
pub use level::LogLevel;
pub use logger::{Logger, MeasureOptions};
pub use metrics::ProcessorMetrics;
pub use processor::{DeliveryMode, ProcessorConfig, ProcessorState, QueueProcessor};
pub use registry::{DestinationId, Registry};
