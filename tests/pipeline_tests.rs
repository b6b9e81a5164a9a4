//! Integration tests for the delivery pipeline
//!
//! These tests verify:
//! - Per-destination FIFO ordering
//! - Flush rendezvous (everything enqueued before flush is visible after)
//! - Backpressure on capped queues
//! - Batch chunking and the batch window
//! - Destination-level gating
//! - Failure isolation between destinations
//! - Retry backoff and the give-up path

use fanlog::prelude::*;
use fanlog::{MemoryDiagnostics, QueueProcessor};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Destination that blocks in `log` until released through a channel.
struct GatedDestination {
    gate: crossbeam_channel::Receiver<()>,
    sink: Arc<Mutex<Vec<String>>>,
}

impl Destination for GatedDestination {
    fn log(&mut self, event: &LogEvent) -> fanlog::Result<bool> {
        let _ = self.gate.recv();
        self.sink
            .lock()
            .push(event.message.clone().unwrap_or_default());
        Ok(true)
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Destination whose every write fails.
struct FailingDestination {
    attempts: Arc<AtomicUsize>,
}

impl Destination for FailingDestination {
    fn log(&mut self, _event: &LogEvent) -> fanlog::Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::destination_write("failing", "backend unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn event(message: &str) -> LogEvent {
    Record::new(message).into_event(LogLevel::Info, "test")
}

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

#[test]
fn test_fifo_order_per_destination() {
    let registry = Registry::with_diagnostics(MemoryDiagnostics::new());
    let destination = MemoryDestination::new("fifo");
    let handle = destination.handle();
    registry
        .add(
            Box::new(destination),
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
        )
        .unwrap();

    for i in 0..200 {
        registry.publish(&event(&format!("m{i}")));
    }
    assert!(registry.flush_all());

    let messages = handle.messages();
    assert_eq!(messages.len(), 200);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message, &format!("m{i}"));
    }
}

#[test]
fn test_flush_rendezvous_delivers_preceding_events() {
    let registry = Registry::with_diagnostics(MemoryDiagnostics::new());
    let destination = MemoryDestination::new("flush");
    let handle = destination.handle();
    let id = registry
        .add(
            Box::new(destination),
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
        )
        .unwrap();

    for i in 0..100 {
        registry.publish(&event(&format!("e{i}")));
    }
    let processor = registry.processor(id).unwrap();
    assert!(processor.flush());

    // the rendezvous guarantees this without any sleeping
    assert_eq!(handle.len(), 100);
    assert_eq!(handle.flush_count(), 1);
}

#[test]
fn test_capped_queue_applies_backpressure() {
    let (release, gate) = crossbeam_channel::unbounded();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let destination = GatedDestination {
        gate,
        sink: Arc::clone(&sink),
    };
    let processor = Arc::new(QueueProcessor::new(
        Box::new(destination),
        DeliveryMode::Immediate,
        ProcessorConfig {
            max_queue_size: Some(2),
            ..ProcessorConfig::default()
        },
        MemoryDiagnostics::new(),
    ));
    processor.start();

    // first event is picked up by the worker and parks on the gate
    assert!(processor.enqueue(event("e0")));
    assert!(wait_until(Duration::from_secs(2), || processor.queue_len() == 0));
    // these two fill the queue
    assert!(processor.enqueue(event("e1")));
    assert!(processor.enqueue(event("e2")));

    let done = Arc::new(AtomicBool::new(false));
    let blocked = {
        let processor = Arc::clone(&processor);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            processor.enqueue(event("e3"));
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::SeqCst), "producer should be blocked");

    for _ in 0..4 {
        release.send(()).unwrap();
    }
    blocked.join().unwrap();
    assert!(done.load(Ordering::SeqCst));

    assert!(processor.flush());
    assert_eq!(
        sink.lock().clone(),
        vec!["e0", "e1", "e2", "e3"],
        "all events delivered in order once the gate opened"
    );
    processor.close();
}

#[test]
fn test_batch_chunking_respects_batch_size() {
    let registry = Registry::with_diagnostics(MemoryDiagnostics::new());
    let destination = MemoryDestination::new("batched");
    let handle = destination.handle();
    registry
        .add(
            Box::new(destination),
            DeliveryMode::Batched,
            ProcessorConfig {
                batch_size: 3,
                batch_window: Duration::from_secs(60),
                ..ProcessorConfig::default()
            },
        )
        .unwrap();

    for i in 0..4 {
        registry.publish(&event(&format!("b{i}")));
    }
    assert!(registry.close_all());

    assert_eq!(handle.batch_sizes(), vec![3, 1]);
    assert_eq!(
        handle.messages(),
        vec!["b0", "b1", "b2", "b3"],
        "order preserved across chunks"
    );
}

#[test]
fn test_batch_window_flushes_partial_batch() {
    let registry = Registry::with_diagnostics(MemoryDiagnostics::new());
    let destination = MemoryDestination::new("windowed");
    let handle = destination.handle();
    registry
        .add(
            Box::new(destination),
            DeliveryMode::Batched,
            ProcessorConfig {
                batch_size: 300,
                batch_window: Duration::from_millis(50),
                ..ProcessorConfig::default()
            },
        )
        .unwrap();

    registry.publish(&event("lonely"));
    assert!(
        wait_until(Duration::from_secs(2), || handle.len() == 1),
        "a single event must not wait for a full batch"
    );
    assert_eq!(handle.batch_sizes(), vec![1]);
}

#[test]
fn test_batched_mode_requires_batch_support() {
    struct NoBatch;
    impl Destination for NoBatch {
        fn log(&mut self, _event: &LogEvent) -> fanlog::Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "nobatch"
        }
    }

    let registry = Registry::with_diagnostics(MemoryDiagnostics::new());
    let err = registry
        .add(
            Box::new(NoBatch),
            DeliveryMode::Batched,
            ProcessorConfig::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::BatchUnsupported { .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_destination_level_gate() {
    let registry = Arc::new(Registry::with_diagnostics(MemoryDiagnostics::new()));
    let destination = MemoryDestination::new("warn-only");
    let handle = destination.handle();
    registry
        .add(
            Box::new(destination),
            DeliveryMode::Immediate,
            ProcessorConfig {
                level: Some(LogLevel::Warn),
                ..ProcessorConfig::default()
            },
        )
        .unwrap();

    let logger = Logger::new("gate", Arc::clone(&registry));
    logger.info("too quiet");
    logger.warn("loud enough");
    logger.error("also loud");
    registry.flush_all();

    assert_eq!(handle.messages(), vec!["loud enough", "also loud"]);
}

#[test]
fn test_failing_destination_does_not_affect_healthy_one() {
    let diagnostics = MemoryDiagnostics::new();
    let registry = Registry::with_diagnostics(diagnostics.clone());
    let attempts = Arc::new(AtomicUsize::new(0));
    registry
        .add(
            Box::new(FailingDestination {
                attempts: Arc::clone(&attempts),
            }),
            DeliveryMode::Immediate,
            ProcessorConfig {
                max_retries: 1000,
                retry_backoff: Duration::from_micros(100),
                ..ProcessorConfig::default()
            },
        )
        .unwrap();
    let healthy = MemoryDestination::new("healthy");
    let handle = healthy.handle();
    registry
        .add(
            Box::new(healthy),
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
        )
        .unwrap();

    for i in 0..20 {
        registry.publish(&event(&format!("x{i}")));
    }
    registry.flush_all();

    assert_eq!(handle.len(), 20, "healthy destination received everything");
    assert_eq!(attempts.load(Ordering::SeqCst), 20);
    assert!(diagnostics.contains(LogLevel::Warn, "write failed"));
}

#[test]
fn test_retry_budget_exhaustion_stops_worker_without_blocking_producers() {
    let diagnostics = MemoryDiagnostics::new();
    let processor = QueueProcessor::new(
        Box::new(FailingDestination {
            attempts: Arc::new(AtomicUsize::new(0)),
        }),
        DeliveryMode::Immediate,
        ProcessorConfig {
            max_retries: 2,
            retry_backoff: Duration::from_micros(100),
            ..ProcessorConfig::default()
        },
        diagnostics.clone(),
    );
    processor.start();

    // two consecutive failures exhaust a budget of two
    processor.enqueue(event("f0"));
    processor.enqueue(event("f1"));
    assert!(wait_until(Duration::from_secs(2), || {
        processor.state() == ProcessorState::Stopped
    }));
    assert!(diagnostics.contains(LogLevel::Fatal, "stopped after 2 failed attempts"));

    // a stopped worker never blocks or stalls its producers
    let started = Instant::now();
    processor.enqueue(event("late"));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!processor.flush());
    assert!(!processor.close());
}

#[test]
fn test_fatal_error_skips_retries() {
    struct FatalDestination;
    impl Destination for FatalDestination {
        fn log(&mut self, _event: &LogEvent) -> fanlog::Result<bool> {
            Err(Error::fatal("credentials rejected"))
        }
        fn name(&self) -> &str {
            "fatal"
        }
    }

    let diagnostics = MemoryDiagnostics::new();
    let processor = QueueProcessor::new(
        Box::new(FatalDestination),
        DeliveryMode::Immediate,
        ProcessorConfig::default(),
        diagnostics.clone(),
    );
    processor.start();

    processor.enqueue(event("doomed"));
    assert!(wait_until(Duration::from_secs(2), || {
        processor.state() == ProcessorState::Stopped
    }));
    assert!(diagnostics.contains(LogLevel::Fatal, "unrecoverable"));
    assert_eq!(processor.metrics().failed(), 1, "no retries after fatal");
}

#[test]
fn test_panicking_destination_is_contained() {
    struct PanickyDestination {
        delivered: Arc<AtomicUsize>,
    }
    impl Destination for PanickyDestination {
        fn log(&mut self, event: &LogEvent) -> fanlog::Result<bool> {
            if event.message.as_deref() == Some("boom") {
                panic!("destination bug");
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
        fn name(&self) -> &str {
            "panicky"
        }
    }

    let diagnostics = MemoryDiagnostics::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    let processor = QueueProcessor::new(
        Box::new(PanickyDestination {
            delivered: Arc::clone(&delivered),
        }),
        DeliveryMode::Immediate,
        ProcessorConfig {
            retry_backoff: Duration::from_micros(100),
            ..ProcessorConfig::default()
        },
        diagnostics.clone(),
    );
    processor.start();

    processor.enqueue(event("before"));
    processor.enqueue(event("boom"));
    processor.enqueue(event("after"));
    assert!(processor.flush());

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    assert_eq!(processor.state(), ProcessorState::Running);
    assert!(diagnostics.contains(LogLevel::Warn, "destination bug"));
    processor.close();
}

#[test]
fn test_lag_warning_for_stale_events() {
    let diagnostics = MemoryDiagnostics::new();
    let destination = MemoryDestination::new("laggy");
    let handle = destination.handle();
    let processor = QueueProcessor::new(
        Box::new(destination),
        DeliveryMode::Immediate,
        ProcessorConfig {
            lag_check_interval: 1,
            lag_threshold: Duration::from_millis(1),
            ..ProcessorConfig::default()
        },
        diagnostics.clone(),
    );

    // age the event past the threshold before the worker ever sees it
    let stale = event("sat in the queue");
    thread::sleep(Duration::from_millis(50));
    processor.enqueue(stale);
    assert!(processor.flush());

    assert_eq!(handle.messages(), vec!["sat in the queue"]);
    assert!(diagnostics.contains(LogLevel::Warn, "delivery lagging"));
    assert!(processor.metrics().lag_warnings() >= 1);
    processor.close();
}

#[test]
fn test_lag_checked_on_batch_chunk_head() {
    let diagnostics = MemoryDiagnostics::new();
    let destination = MemoryDestination::new("laggy-batch");
    let handle = destination.handle();
    let processor = QueueProcessor::new(
        Box::new(destination),
        DeliveryMode::Batched,
        ProcessorConfig {
            lag_threshold: Duration::from_millis(1),
            batch_window: Duration::from_secs(60),
            ..ProcessorConfig::default()
        },
        diagnostics.clone(),
    );
    processor.start();

    let stale = event("chunk head");
    thread::sleep(Duration::from_millis(50));
    processor.enqueue(stale);
    assert!(processor.close());

    assert_eq!(handle.messages(), vec!["chunk head"]);
    assert!(diagnostics.contains(LogLevel::Warn, "delivery lagging"));
    assert_eq!(processor.metrics().lag_warnings(), 1);
}

#[test]
fn test_metric_only_events_flow_through() {
    let registry = Arc::new(Registry::with_diagnostics(MemoryDiagnostics::new()));
    let destination = MemoryDestination::new("metrics");
    let handle = destination.handle();
    registry
        .add(
            Box::new(destination),
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
        )
        .unwrap();

    let logger = Logger::new("metrics", Arc::clone(&registry));
    logger.info_with(Record::empty().metric("queries.count").metric_amount(3.0));
    registry.flush_all();

    let events = handle.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_metric_only());
    assert_eq!(events[0].metric.as_deref(), Some("queries.count"));
    assert_eq!(events[0].metric_amount, Some(3.0));
}

#[test]
fn test_measure_min_duration_suppression_and_error_bypass() {
    let registry = Arc::new(Registry::with_diagnostics(MemoryDiagnostics::new()));
    let destination = MemoryDestination::new("measured");
    let handle = destination.handle();
    registry
        .add(
            Box::new(destination),
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
        )
        .unwrap();
    let logger = Logger::new("measured", Arc::clone(&registry));

    // fast and successful: suppressed by the threshold
    let ok: std::result::Result<i32, std::io::Error> = logger.measure(
        LogLevel::Info,
        MeasureOptions::new("fast call").min_duration(60_000.0),
        || Ok(7),
    );
    assert_eq!(ok.unwrap(), 7);

    // fast but failed: the threshold does not apply to errors
    let err: std::result::Result<i32, std::io::Error> = logger.measure(
        LogLevel::Info,
        MeasureOptions::new("failed call")
            .min_duration(60_000.0)
            .on_exception_level(LogLevel::Error),
        || Err(std::io::Error::other("upstream refused")),
    );
    assert!(err.is_err());
    registry.flush_all();

    let events = handle.events();
    assert_eq!(events.len(), 1, "only the failing call is logged");
    assert_eq!(events[0].level, LogLevel::Error);
    assert_eq!(events[0].message.as_deref(), Some("failed call"));
    let exception = events[0].exception.as_ref().unwrap();
    assert_eq!(exception.message, "upstream refused");
    assert!(events[0].duration.is_some());
}

#[test]
fn test_remove_detaches_without_closing() {
    let registry = Registry::with_diagnostics(MemoryDiagnostics::new());
    let destination = MemoryDestination::new("detached");
    let handle = destination.handle();
    let id = registry
        .add(
            Box::new(destination),
            DeliveryMode::Immediate,
            ProcessorConfig::default(),
        )
        .unwrap();

    registry.publish(&event("kept"));
    let processor = registry.remove(id).expect("registered id");
    assert!(registry.is_empty());

    // the detached processor still drains its queue
    assert!(processor.flush());
    assert_eq!(handle.messages(), vec!["kept"]);
    assert!(!handle.is_closed());
    assert!(processor.close());
    assert!(handle.is_closed());
}
