//! # Built-in logging subscriber.
//!
//! [`LogWriter`] renders every runtime event as a structured `tracing`
//! record, which the binary's subscriber writes to stderr or to the
//! configured log file. It is the event subscriber wired in by default by
//! the `procvisor` binary; library users can attach their own
//! [`Subscribe`](crate::Subscribe) implementations alongside or instead.
//!
//! ## Output shape (with the default fmt subscriber)
//! ```text
//! INFO  worker spawned worker=core pid=4242 generation=0
//! DEBUG worker healthy worker=core pid=4242
//! WARN  worker hung, force-killed worker=core pid=4242 generation=0 rss_kb=2048 cpu_ms=150
//! INFO  worker reaped worker=core pid=4313 rss_kb=2048 cpu_ms=910
//! INFO  all workers reaped
//! ```
//!
//! Verdict severities follow the lifecycle: healthy cycles log at `debug`,
//! crashes and hangs at `warn`, spawn failures and subscriber panics at
//! `error`, everything else at `info`.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Structured logging subscriber.
///
/// Translates [`Event`]s into `tracing` records with stable field names
/// (`worker`, `pid`, `generation`, `reason`, `rss_kb`, `cpu_ms`) so log
/// pipelines can filter on them.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let pid = e.pid.unwrap_or(0);
        let generation = e.generation.unwrap_or(0);
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::WorkerSpawned => {
                info!(worker, pid, generation, "worker spawned");
            }
            EventKind::WorkerHealthy => {
                debug!(worker, pid, "worker healthy");
            }
            EventKind::WorkerCrashed => {
                warn!(
                    worker,
                    pid,
                    generation,
                    reason,
                    rss_kb = e.rss_kb.unwrap_or(0),
                    cpu_ms = e.cpu_ms.unwrap_or(0),
                    "worker crashed"
                );
            }
            EventKind::WorkerHung => {
                warn!(
                    worker,
                    pid,
                    generation,
                    rss_kb = e.rss_kb.unwrap_or(0),
                    cpu_ms = e.cpu_ms.unwrap_or(0),
                    "worker hung, force-killed"
                );
            }
            EventKind::SpawnFailed => {
                error!(worker, generation, reason, "worker spawn failed");
            }
            EventKind::ShutdownRequested => {
                info!(reason, "shutdown requested");
            }
            EventKind::WorkerReaped => {
                info!(
                    worker,
                    pid,
                    rss_kb = e.rss_kb.unwrap_or(0),
                    cpu_ms = e.cpu_ms.unwrap_or(0),
                    "worker reaped"
                );
            }
            EventKind::ReapSkipped => {
                info!(worker, pid, "reap skipped, process already gone");
            }
            EventKind::GraceExceeded => {
                warn!(worker, pid, "reap grace exceeded, force-killing");
            }
            EventKind::AllReaped => {
                info!("all workers reaped");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = worker, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = worker, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Rendering must cope with any kind, with or without metadata attached.
    #[tokio::test]
    async fn test_on_event_handles_every_kind() {
        let log = LogWriter;
        let events = [
            Event::new(EventKind::WorkerSpawned)
                .with_worker("core")
                .with_pid(4242)
                .with_generation(0),
            Event::new(EventKind::WorkerHealthy),
            Event::new(EventKind::WorkerCrashed).with_reason("exit status: 1"),
            Event::new(EventKind::WorkerHung).with_usage(2048, 150),
            Event::new(EventKind::SpawnFailed),
            Event::new(EventKind::ShutdownRequested).with_reason("termination signal"),
            Event::new(EventKind::WorkerReaped),
            Event::new(EventKind::ReapSkipped),
            Event::new(EventKind::GraceExceeded),
            Event::new(EventKind::AllReaped),
            Event::subscriber_overflow("metrics", "full"),
            Event::subscriber_panicked("metrics", "boom".to_string()),
        ];
        for ev in &events {
            log.on_event(ev).await;
        }
    }
}
