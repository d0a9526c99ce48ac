//! # Runtime events emitted by the supervisor, monitor, and reaper.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Worker lifecycle events**: spawn, health verdicts, respawn failures
//! - **Shutdown events**: shutdown request and the reap sequence outcome
//! - **Subscriber events**: fan-out diagnostics (overflow, panic)
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! worker name, OS pid, restart generation, reasons, and resource usage.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerCrashed)
//!     .with_worker("core")
//!     .with_pid(4242)
//!     .with_generation(3)
//!     .with_reason("exit status: 1");
//!
//! assert_eq!(ev.kind, EventKind::WorkerCrashed);
//! assert_eq!(ev.worker.as_deref(), Some("core"));
//! assert_eq!(ev.pid, Some(4242));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic info/message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or spawn escalation).
    ///
    /// Sets:
    /// - `reason`: what triggered the shutdown
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ShutdownRequested,

    /// A worker was terminated and collected during the reap sequence.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: collected OS pid
    /// - `rss_kb` / `cpu_ms`: the collected process's resource usage
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    WorkerReaped,

    /// A reap target was skipped because its process no longer exists.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: pid that could not be signalled
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ReapSkipped,

    /// Reap grace period exceeded; the worker was force-killed.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: force-killed OS pid
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    GraceExceeded,

    /// Every slot in the watch table has been reaped or skipped.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    AllReaped,

    // === Worker lifecycle events ===
    /// A worker process was launched and registered in its slot.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: new OS pid
    /// - `generation`: restart generation (0 for the initial launch)
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    WorkerSpawned,

    /// A worker pulsed at least once since the previous check cycle.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: OS pid
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    WorkerHealthy,

    /// A worker exited on its own and was collected.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: exited OS pid
    /// - `generation`: generation that crashed
    /// - `reason`: exit status description
    /// - `rss_kb` / `cpu_ms`: the collected process's resource usage
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    WorkerCrashed,

    /// A worker was alive but silent for a full check interval and was
    /// force-killed.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: force-killed OS pid
    /// - `generation`: generation that hung
    /// - `rss_kb` / `cpu_ms`: the collected process's resource usage
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    WorkerHung,

    /// A worker could not be (re)launched.
    ///
    /// Emitted before the supervisor escalates to shutdown.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: spawn error message
    /// - `generation`: generation that failed to start
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SpawnFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Name of the worker (or subscriber), if applicable.
    pub worker: Option<Arc<str>>,
    /// OS process id the event refers to.
    pub pid: Option<i32>,
    /// Restart generation (0 = initial launch, incremented per respawn).
    pub generation: Option<u32>,
    /// Human-readable reason (exit status, spawn error, overflow details).
    pub reason: Option<Arc<str>>,
    /// Peak resident set size of the collected process, KiB.
    pub rss_kb: Option<u64>,
    /// Accumulated user CPU time of the collected process, milliseconds.
    pub cpu_ms: Option<u64>,
    /// Event classification.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            at: SystemTime::now(),
            worker: None,
            pid: None,
            generation: None,
            reason: None,
            rss_kb: None,
            cpu_ms: None,
        }
    }

    /// Attaches a worker (or subscriber) name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches an OS process id.
    #[inline]
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a restart generation.
    #[inline]
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a resource usage snapshot (peak RSS in KiB, user CPU in ms).
    #[inline]
    pub fn with_usage(mut self, rss_kb: u64, cpu_ms: u64) -> Self {
        self.rss_kb = Some(rss_kb);
        self.cpu_ms = Some(cpu_ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
