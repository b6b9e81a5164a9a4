//! Per-destination queue and worker
//!
//! Each registered destination gets one [`QueueProcessor`]: a FIFO queue and
//! a single dedicated worker thread consuming it. Producers on arbitrary
//! threads enqueue events; the worker delivers them one at a time
//! (immediate mode) or in size/time-bounded chunks (batched mode).
//! Flush and close ride the same queue as events, so their rendezvous only
//! completes after every earlier event has been delivered or attempted.

use super::command::{Command, CommandKind, QueueItem};
use super::destination::Destination;
use super::diagnostics::SharedDiagnostics;
use super::error::{Error, Result};
use super::event::LogEvent;
use super::filter::LogFilter;
use super::level::LogLevel;
use super::metrics::ProcessorMetrics;
use chrono::Utc;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How a destination receives its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// One `log` call per event as it is dequeued.
    Immediate,
    /// `batch` calls of up to `batch_size` events, flushed at least every
    /// `batch_window`.
    Batched,
}

/// Worker lifecycle. `Running` is terminal only via a close command or an
/// unrecoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Running,
    Stopped,
}

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Per-destination tuning knobs.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Queue capacity. A capped queue blocks producers when full
    /// (backpressure); `None` never blocks but grows without bound under
    /// sustained overload. An explicit per-destination choice.
    pub max_queue_size: Option<usize>,
    /// Maximum events per `batch` call (batched mode).
    pub batch_size: usize,
    /// Longest a queued event waits before a partial batch is flushed.
    pub batch_window: Duration,
    /// Check delivery lag every this many processed events (immediate mode).
    pub lag_check_interval: u64,
    /// Event age beyond which a lag diagnostic is emitted.
    pub lag_threshold: Duration,
    /// Consecutive failures before the worker gives up permanently.
    pub max_retries: usize,
    /// Backoff unit; attempt N sleeps `retry_backoff * N` (linear).
    pub retry_backoff: Duration,
    /// Destination-level severity gate, checked again by the worker.
    pub level: Option<LogLevel>,
    /// Destination-level filter, checked again by the worker.
    pub filter: Option<LogFilter>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_queue_size: Some(10_000),
            batch_size: 300,
            batch_window: Duration::from_secs(5),
            lag_check_interval: 1000,
            lag_threshold: Duration::from_secs(30),
            max_retries: 100,
            retry_backoff: Duration::from_secs(1),
            level: None,
            filter: None,
        }
    }
}

impl ProcessorConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("processor", "batch_size must be at least 1"));
        }
        if self.max_queue_size == Some(0) {
            return Err(Error::config(
                "processor",
                "max_queue_size must be at least 1 (use None for an uncapped queue)",
            ));
        }
        if self.lag_check_interval == 0 {
            return Err(Error::config(
                "processor",
                "lag_check_interval must be at least 1",
            ));
        }
        Ok(())
    }

    /// The destination-granularity gate of the pipeline; the front-end gate
    /// may already have passed a stricter or looser configuration.
    fn accepts(&self, event: &LogEvent) -> bool {
        if let Some(level) = self.level {
            if event.level < level {
                return false;
            }
        }
        if let Some(filter) = &self.filter {
            if !filter.accepts(event) {
                return false;
            }
        }
        true
    }
}

/// Wake-signal for the batched worker: set when the queue reaches the batch
/// size or a command arrives, cleared once the backlog is drained.
struct WakeSignal {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl WakeSignal {
    fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn set(&self) {
        let mut flag = self.flag.lock();
        *flag = true;
        self.condvar.notify_one();
    }

    fn clear(&self) {
        *self.flag.lock() = false;
    }

    fn wait_timeout(&self, window: Duration) {
        let mut flag = self.flag.lock();
        if !*flag {
            self.condvar.wait_for(&mut flag, window);
        }
    }
}

struct Startup {
    destination: Option<Box<dyn Destination>>,
    handle: Option<thread::JoinHandle<()>>,
}

pub struct QueueProcessor {
    name: String,
    mode: DeliveryMode,
    config: ProcessorConfig,
    sender: Sender<QueueItem>,
    /// Kept so the channel survives worker exit; late enqueues still land
    /// on the queue even though nothing will drain them.
    receiver: Receiver<QueueItem>,
    state: Arc<AtomicU8>,
    wake: Arc<WakeSignal>,
    metrics: Arc<ProcessorMetrics>,
    diagnostics: SharedDiagnostics,
    startup: Mutex<Startup>,
}

impl QueueProcessor {
    pub fn new(
        destination: Box<dyn Destination>,
        mode: DeliveryMode,
        config: ProcessorConfig,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        let (sender, receiver) = match config.max_queue_size {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };
        Self {
            name: destination.name().to_string(),
            mode,
            config,
            sender,
            receiver,
            state: Arc::new(AtomicU8::new(STATE_IDLE)),
            wake: Arc::new(WakeSignal::new()),
            metrics: Arc::new(ProcessorMetrics::new()),
            diagnostics,
            startup: Mutex::new(Startup {
                destination: Some(destination),
                handle: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn state(&self) -> ProcessorState {
        match self.state.load(Ordering::Acquire) {
            STATE_IDLE => ProcessorState::Idle,
            STATE_RUNNING => ProcessorState::Running,
            _ => ProcessorState::Stopped,
        }
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// Events and commands currently queued.
    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    /// Start the worker thread. Idempotent; called lazily by `enqueue` and
    /// eagerly by the registry at registration.
    pub fn start(&self) {
        let mut startup = self.startup.lock();
        if self.state.load(Ordering::Acquire) != STATE_IDLE {
            return;
        }
        let Some(destination) = startup.destination.take() else {
            return;
        };

        let worker = Worker {
            name: self.name.clone(),
            destination,
            receiver: self.receiver.clone(),
            config: self.config.clone(),
            mode: self.mode,
            state: Arc::clone(&self.state),
            wake: Arc::clone(&self.wake),
            metrics: Arc::clone(&self.metrics),
            diagnostics: Arc::clone(&self.diagnostics),
            retry_count: 0,
            processed: 0,
        };

        self.state.store(STATE_RUNNING, Ordering::Release);
        match thread::Builder::new()
            .name(format!("fanlog-{}", self.name))
            .spawn(move || worker.run())
        {
            Ok(handle) => startup.handle = Some(handle),
            Err(e) => {
                self.state.store(STATE_STOPPED, Ordering::Release);
                self.diagnostics.report(
                    LogLevel::Fatal,
                    &self.name,
                    &format!("failed to spawn worker thread: {e}"),
                );
            }
        }
    }

    /// Queue an event for delivery. Blocks only when the queue is capped
    /// and full. Returns false when the event could not be queued (full
    /// queue behind a stopped worker).
    pub fn enqueue(&self, event: LogEvent) -> bool {
        match self.state.load(Ordering::Acquire) {
            STATE_IDLE => self.start(),
            STATE_STOPPED => {
                // nothing drains this queue anymore; never block the producer
                let ok = self.sender.try_send(QueueItem::Event(Box::new(event))).is_ok();
                if ok {
                    self.metrics.record_enqueued();
                }
                return ok;
            }
            _ => {}
        }

        if self.sender.send(QueueItem::Event(Box::new(event))).is_err() {
            return false;
        }
        self.metrics.record_enqueued();
        if self.mode == DeliveryMode::Batched && self.receiver.len() >= self.config.batch_size {
            self.wake.set();
        }
        true
    }

    /// Block until every event enqueued before this call has been delivered
    /// or attempted. Returns false immediately when the worker is not
    /// running.
    pub fn flush(&self) -> bool {
        self.rendezvous(CommandKind::Flush)
    }

    /// Flush, close the destination and stop the worker. Returns false
    /// immediately when the worker is not running.
    pub fn close(&self) -> bool {
        let acknowledged = self.rendezvous(CommandKind::Close);
        if let Some(handle) = self.startup.lock().handle.take() {
            let _ = handle.join();
        }
        acknowledged
    }

    fn rendezvous(&self, kind: CommandKind) -> bool {
        if self.state.load(Ordering::Acquire) != STATE_RUNNING {
            return false;
        }
        let (command, reply_rx) = Command::new(kind);
        if self.sender.send(QueueItem::Command(command)).is_err() {
            return false;
        }
        // prompt service in batched mode instead of waiting out the window
        self.wake.set();
        reply_rx.recv().unwrap_or(false)
    }
}

/// One processing step's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    /// Close command serviced; stop cleanly.
    Close,
    /// Fatal error or retry budget exhausted; stop without draining.
    GiveUp,
}

struct Worker {
    name: String,
    destination: Box<dyn Destination>,
    receiver: Receiver<QueueItem>,
    config: ProcessorConfig,
    mode: DeliveryMode,
    state: Arc<AtomicU8>,
    wake: Arc<WakeSignal>,
    metrics: Arc<ProcessorMetrics>,
    diagnostics: SharedDiagnostics,
    retry_count: usize,
    processed: u64,
}

impl Worker {
    fn run(mut self) {
        match self.mode {
            DeliveryMode::Immediate => self.run_immediate(),
            DeliveryMode::Batched => self.run_batched(),
        }
        self.state.store(STATE_STOPPED, Ordering::Release);
        self.sweep();
    }

    fn run_immediate(&mut self) {
        loop {
            // blocks on an empty queue; disconnection means the processor
            // itself was dropped
            let Ok(item) = self.receiver.recv() else {
                return;
            };
            match item {
                QueueItem::Command(command) => {
                    if self.service_command(&command) {
                        return;
                    }
                }
                QueueItem::Event(event) => {
                    if self.deliver_one(&event) != Step::Continue {
                        return;
                    }
                }
            }
        }
    }

    fn run_batched(&mut self) {
        loop {
            self.wake.wait_timeout(self.config.batch_window);
            if self.drain() != Step::Continue {
                return;
            }
        }
    }

    fn deliver_one(&mut self, event: &LogEvent) -> Step {
        if !self.config.accepts(event) {
            return Step::Continue;
        }
        self.processed += 1;
        if self.processed % self.config.lag_check_interval == 0 {
            self.check_lag(event);
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| self.destination.log(event).map(|_| ())));
        self.settle(outcome, 1)
    }

    /// Drain up to the currently observed queue length, partitioning events
    /// into chunks of at most `batch_size` and commands into a side list.
    /// Full chunks are delivered as they fill, so a burst larger than the
    /// batch size yields multiple properly sized batches.
    fn drain(&mut self) -> Step {
        let pending = self.receiver.len();
        let mut chunk: Vec<LogEvent> = Vec::new();
        let mut commands: Vec<Command> = Vec::new();
        let mut step = Step::Continue;

        for _ in 0..pending {
            let Ok(item) = self.receiver.try_recv() else {
                break;
            };
            match item {
                QueueItem::Event(event) => {
                    if !self.config.accepts(&event) {
                        continue;
                    }
                    chunk.push(*event);
                    if chunk.len() == self.config.batch_size {
                        step = self.deliver_chunk(&mut chunk);
                        if step != Step::Continue {
                            break;
                        }
                    }
                }
                QueueItem::Command(command) => commands.push(command),
            }
        }

        if step == Step::Continue && !chunk.is_empty() {
            step = self.deliver_chunk(&mut chunk);
        }

        if step == Step::Continue {
            let mut closing = false;
            for command in commands {
                if closing {
                    command.acknowledge(false);
                } else if self.service_command(&command) {
                    closing = true;
                }
            }
            if closing {
                return Step::Close;
            }
        } else {
            for command in commands {
                command.acknowledge(false);
            }
            return step;
        }

        // re-arm the signal only once the backlog is small; waiting
        // producers are re-signaled promptly otherwise
        if self.receiver.len() < self.config.batch_size {
            self.wake.clear();
        }
        Step::Continue
    }

    fn deliver_chunk(&mut self, chunk: &mut Vec<LogEvent>) -> Step {
        if let Some(first) = chunk.first() {
            // lag is measured on the chunk head, its oldest event
            self.check_lag(first);
        }
        let events = std::mem::take(chunk);
        let count = events.len() as u64;
        self.metrics.record_batch();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.destination.batch(&events)));
        self.settle(outcome, count)
    }

    /// Classify one destination call: success resets the retry counter;
    /// fatal errors and an exhausted budget stop the worker; transient
    /// errors drop the item, back off linearly, and continue.
    fn settle(
        &mut self,
        outcome: thread::Result<Result<()>>,
        count: u64,
    ) -> Step {
        match outcome {
            Ok(Ok(())) => {
                self.retry_count = 0;
                self.metrics.record_processed(count);
                Step::Continue
            }
            Ok(Err(e)) if e.is_fatal() => {
                self.metrics.record_failed();
                self.diagnostics.report(
                    LogLevel::Fatal,
                    &self.name,
                    &format!("unrecoverable error, stopping worker: {e}"),
                );
                Step::GiveUp
            }
            Ok(Err(e)) => self.backoff(e.to_string()),
            Err(panic) => self.backoff(panic_message(panic)),
        }
    }

    fn backoff(&mut self, message: String) -> Step {
        self.metrics.record_failed();
        self.retry_count += 1;
        if self.retry_count >= self.config.max_retries {
            let err = Error::retry_exhausted(&self.name, self.retry_count);
            self.diagnostics
                .report(LogLevel::Fatal, &self.name, &err.to_string());
            return Step::GiveUp;
        }
        self.diagnostics.report(
            LogLevel::Warn,
            &self.name,
            &format!(
                "{} (attempt {}/{})",
                Error::destination_write(&self.name, &message),
                self.retry_count,
                self.config.max_retries
            ),
        );
        // linear backoff
        thread::sleep(self.config.retry_backoff * self.retry_count as u32);
        Step::Continue
    }

    fn check_lag(&self, event: &LogEvent) {
        let age = event.age(Utc::now());
        if age > self.config.lag_threshold {
            self.metrics.record_lag_warning();
            self.diagnostics.report(
                LogLevel::Warn,
                &self.name,
                &format!(
                    "delivery lagging: queued event is {:.1}s old (threshold {:.1}s)",
                    age.as_secs_f64(),
                    self.config.lag_threshold.as_secs_f64()
                ),
            );
        }
    }

    /// Returns true when the command closes the worker.
    fn service_command(&mut self, command: &Command) -> bool {
        let result = match command.kind {
            CommandKind::Flush => self.destination.flush(),
            CommandKind::Close => self
                .destination
                .flush()
                .and_then(|()| self.destination.close()),
        };
        if let Err(e) = &result {
            self.diagnostics.report(
                LogLevel::Warn,
                &self.name,
                &format!("{:?} command failed: {e}", command.kind),
            );
        }
        let closing = command.kind == CommandKind::Close;
        if closing {
            // observable as Stopped before the caller's close() returns
            self.state.store(STATE_STOPPED, Ordering::Release);
        }
        command.acknowledge(result.is_ok());
        closing
    }

    /// Answer leftover commands so racing flush callers are not left
    /// blocked, and account for events that will never be delivered.
    fn sweep(&mut self) {
        let mut dropped: u64 = 0;
        while let Ok(item) = self.receiver.try_recv() {
            match item {
                QueueItem::Command(command) => command.acknowledge(false),
                QueueItem::Event(_) => dropped += 1,
            }
        }
        if dropped > 0 {
            self.metrics.record_dropped_at_stop(dropped);
            self.diagnostics.report(
                LogLevel::Warn,
                &self.name,
                &format!("{dropped} queued events dropped at worker stop"),
            );
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::MemoryDiagnostics;
    use crate::core::event::Record;

    struct Collecting {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Destination for Collecting {
        fn log(&mut self, event: &LogEvent) -> Result<bool> {
            self.seen
                .lock()
                .push(event.message.clone().unwrap_or_default());
            Ok(true)
        }

        fn name(&self) -> &str {
            "collecting"
        }
    }

    fn collecting() -> (Box<dyn Destination>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Collecting {
                seen: Arc::clone(&seen),
            }),
            seen,
        )
    }

    fn event(message: &str) -> LogEvent {
        Record::new(message).into_event(LogLevel::Info, "test")
    }

    #[test]
    fn test_starts_lazily_on_first_enqueue() {
        let (dest, seen) = collecting();
        let processor = QueueProcessor::new(
            dest,
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
            MemoryDiagnostics::new(),
        );
        assert_eq!(processor.state(), ProcessorState::Idle);

        assert!(processor.enqueue(event("first")));
        assert_eq!(processor.state(), ProcessorState::Running);
        assert!(processor.flush());
        assert_eq!(seen.lock().as_slice(), ["first"]);
    }

    #[test]
    fn test_rendezvous_on_idle_processor_returns_false() {
        let (dest, _) = collecting();
        let processor = QueueProcessor::new(
            dest,
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
            MemoryDiagnostics::new(),
        );
        assert!(!processor.flush());
        assert!(!processor.close());
    }

    #[test]
    fn test_close_stops_worker_and_later_rendezvous_fails() {
        let (dest, seen) = collecting();
        let processor = QueueProcessor::new(
            dest,
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
            MemoryDiagnostics::new(),
        );
        processor.start();
        processor.enqueue(event("before close"));
        assert!(processor.close());
        assert_eq!(processor.state(), ProcessorState::Stopped);
        assert_eq!(seen.lock().as_slice(), ["before close"]);

        assert!(!processor.flush());
        assert!(!processor.close());
    }

    #[test]
    fn test_destination_level_gate_filters_in_worker() {
        let (dest, seen) = collecting();
        let config = ProcessorConfig {
            level: Some(LogLevel::Warn),
            ..ProcessorConfig::default()
        };
        let processor = QueueProcessor::new(
            dest,
            DeliveryMode::Immediate,
            config,
            MemoryDiagnostics::new(),
        );
        processor.start();
        processor.enqueue(Record::new("too quiet").into_event(LogLevel::Debug, "test"));
        processor.enqueue(Record::new("loud").into_event(LogLevel::Error, "test"));
        assert!(processor.flush());
        assert_eq!(seen.lock().as_slice(), ["loud"]);
    }

    #[test]
    fn test_config_validation() {
        let config = ProcessorConfig {
            batch_size: 0,
            ..ProcessorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ProcessorConfig {
            max_queue_size: Some(0),
            ..ProcessorConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(ProcessorConfig::default().validate().is_ok());
    }
}
