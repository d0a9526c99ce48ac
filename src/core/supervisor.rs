//! # Supervisor: owns the watch table and orchestrates one watchdog run.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the shared
//! [`WatchTable`], and the run token. One call to [`Supervisor::run`]
//! launches the configured workers, drives the health-check loop until
//! shutdown is requested, and always finishes with the reap sequence.
//!
//! ## Key responsibilities
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - open the heartbeat channel and run its drain task
//! - launch workers in slot order (startup aborts on the first failure)
//! - hand the child handles to the [`Monitor`] for verdict cycles
//! - handle OS termination signals (SIGINT/SIGTERM/Ctrl-C)
//! - reap every worker before returning, whatever ended the run
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Config { workers, intervals, grace } ──► Supervisor::new(cfg, subscribers)
//!
//! Wiring:
//!   - HeartbeatChannel::open() ── drain task: signalfd ──► WatchTable::mark_alive
//!   - shutdown::watch(): SIGINT/SIGTERM ──► ShutdownRequested + token.cancel()
//!   - subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! Run:
//!   spawn slot 0..N (fatal on failure) ──► Monitor::run() until cancelled
//!                                                │
//!   reap_all(): SIGTERM ── grace ── SIGKILL, usage accounting, AllReaped
//!                                                │
//!   teardown: drain/watcher joined, bus closed, listener drained,
//!             subscriber queues flushed
//! ```
//!
//! Cancellation is one-way: the token is cancelled at most once per run
//! (OS signal, programmatic [`Supervisor::run_token`], or respawn-failure
//! escalation) and is never reset. `run` consumes the supervisor, so a
//! finished watchdog cannot be restarted by accident.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{heartbeat, Config, LogWriter, Subscribe, Supervisor, WorkerSpec};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Block before the runtime exists so every thread inherits the mask.
//!     heartbeat::block_heartbeat_signal()?;
//!
//!     let mut cfg = Config::default();
//!     cfg.workers.push(WorkerSpec::new("core", "/usr/libexec/pulse-worker", None));
//!
//!     let rt = tokio::runtime::Builder::new_multi_thread()
//!         .enable_all()
//!         .build()?;
//!     rt.block_on(async {
//!         let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//!         let supervisor = Supervisor::new(cfg, subs)?;
//!         supervisor.run().await?;
//!         Ok(())
//!     })
//! }
//! ```

use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::{monitor::Monitor, reaper, shutdown, spawner::Spawner};
use crate::heartbeat::HeartbeatChannel;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::workers::WatchTable;
use crate::{config::Config, error::RuntimeError, events::Bus};

/// Coordinates worker launch, health verdicts, event delivery (via
/// [`SubscriberSet`]), and the final reap.
pub struct Supervisor {
    /// Global watchdog configuration.
    pub cfg: Config,
    /// Event bus shared with all runtime tasks.
    pub bus: Bus,
    /// Fan-out set for subscribers.
    pub subs: Arc<SubscriberSet>,
    /// Shared liveness table, also read by the heartbeat drain task.
    pub table: Arc<WatchTable>,

    token: CancellationToken,
}

impl Supervisor {
    /// Creates a new supervisor for a validated configuration.
    ///
    /// Must be called within a tokio runtime: the subscriber set spawns
    /// its worker tasks immediately.
    ///
    /// # Errors
    /// [`RuntimeError::ConfigInvalid`] (via [`Config::validate`]) if the
    /// configuration cannot be supervised.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Result<Self, RuntimeError> {
        cfg.validate()?;
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers));
        let table = Arc::new(WatchTable::new(&cfg.workers));
        Ok(Self {
            cfg,
            bus,
            subs,
            table,
            token: CancellationToken::new(),
        })
    }

    /// Returns a handle to the run token.
    ///
    /// Cancelling it requests shutdown exactly like a termination signal;
    /// embedders and tests use this instead of delivering real signals.
    pub fn run_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs the watchdog until shutdown, then reaps every worker.
    ///
    /// Consumes the supervisor: the run token is spent and the bus is
    /// closed during teardown. Returns once every slot has been reaped or
    /// skipped and all pending events have been flushed to subscribers.
    ///
    /// # Errors
    /// [`RuntimeError::HeartbeatChannel`] if the pulse descriptor cannot
    /// be opened, or [`RuntimeError::Spawn`] if a worker fails its initial
    /// launch (workers launched before the failure are reaped first).
    pub async fn run(self) -> Result<(), RuntimeError> {
        let token = self.token.clone();
        let channel = HeartbeatChannel::open()?;

        let listener = self.subscriber_listener();
        let drain = tokio::spawn(channel.run(Arc::clone(&self.table), token.clone()));
        let watcher = shutdown::watch(self.bus.clone(), token.clone());

        let spawner = Spawner::new(self.cfg.clone(), self.bus.clone());
        let mut children: Vec<Option<Child>> = (0..self.table.len()).map(|_| None).collect();

        let mut startup_failure = None;
        for (i, slot) in self.table.iter() {
            match spawner.spawn_into(slot, false) {
                Ok(child) => children[i] = Some(child),
                Err(err) => {
                    startup_failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = startup_failure {
            reaper::reap_all(&self.cfg, &self.bus, &self.table, &mut children).await;
            drop(spawner);
            self.teardown(drain, watcher, listener).await;
            return Err(err);
        }

        let monitor = Monitor::new(
            self.cfg.clone(),
            self.bus.clone(),
            spawner,
            Arc::clone(&self.table),
            children,
            token.clone(),
        );
        let mut children = monitor.run().await;

        reaper::reap_all(&self.cfg, &self.bus, &self.table, &mut children).await;
        self.teardown(drain, watcher, listener).await;
        Ok(())
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget). The task ends once every bus sender is gone.
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "subscriber listener lagged, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Joins the helper tasks, closes the bus, and flushes subscribers.
    ///
    /// The bus must be dropped before awaiting the listener: the listener
    /// exits only when the last sender is gone, and by this point every
    /// other sender clone has ended with its task.
    async fn teardown(
        self,
        drain: JoinHandle<()>,
        watcher: JoinHandle<()>,
        listener: JoinHandle<()>,
    ) {
        self.token.cancel();
        let _ = drain.await;
        let _ = watcher.await;

        let Supervisor { bus, subs, .. } = self;
        drop(bus);
        let _ = listener.await;

        if let Ok(set) = Arc::try_unwrap(subs) {
            set.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use crate::workers::WorkerSpec;
    use std::time::Duration;

    fn drain_kinds(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        // Matched by hand: the Ok side holds a Supervisor, which has no
        // Debug form to unwrap through.
        let err = match Supervisor::new(Config::default(), vec![]) {
            Ok(_) => panic!("an empty worker set must be rejected"),
            Err(err) => err,
        };
        assert_eq!(err.as_label(), "config_invalid");
    }

    #[tokio::test]
    async fn test_run_spawns_and_reaps_on_cancel() {
        let mut cfg = Config::default();
        // Long interval: the run is cancelled before any verdict cycle.
        cfg.check_interval = Duration::from_secs(30);
        cfg.workers.push(WorkerSpec::new("sleeper", "/bin/sleep", None));

        let sup = Supervisor::new(cfg, vec![]).unwrap();
        let token = sup.run_token();
        let mut rx = sup.bus.subscribe();

        let run = tokio::spawn(sup.run());
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();

        let res = tokio::time::timeout(Duration::from_secs(15), run)
            .await
            .expect("run did not finish after cancel")
            .unwrap();
        assert!(res.is_ok());

        let kinds = drain_kinds(&mut rx);
        assert!(kinds.contains(&EventKind::WorkerSpawned));
        assert!(kinds.contains(&EventKind::WorkerReaped));
        assert_eq!(kinds.last(), Some(&EventKind::AllReaped));
    }

    #[tokio::test]
    async fn test_run_reaps_partial_set_when_initial_spawn_fails() {
        let mut cfg = Config::default();
        cfg.workers.push(WorkerSpec::new("good", "/bin/sleep", None));
        cfg.workers
            .push(WorkerSpec::new("bad", "/nonexistent/worker-bin", None));

        let sup = Supervisor::new(cfg, vec![]).unwrap();
        let mut rx = sup.bus.subscribe();

        let res = tokio::time::timeout(Duration::from_secs(15), sup.run())
            .await
            .expect("startup failure must resolve promptly");
        let err = res.unwrap_err();
        assert_eq!(err.as_label(), "spawn_failed");

        let kinds = drain_kinds(&mut rx);
        assert!(kinds.contains(&EventKind::WorkerSpawned));
        assert!(kinds.contains(&EventKind::SpawnFailed));
        assert!(kinds.contains(&EventKind::WorkerReaped));
        assert_eq!(kinds.last(), Some(&EventKind::AllReaped));
    }
}
