//! # procvisor
//!
//! **Procvisor** is a daemonized watchdog for a fixed set of worker
//! processes on Linux.
//!
//! It launches each configured worker as a real child process, listens for
//! the realtime-signal heartbeats the workers pulse back, and runs a
//! fixed-cadence health loop that classifies every slot as healthy,
//! crashed, or hung. Crashed workers are relaunched, hung workers are
//! killed and relaunched, and shutdown reaps the whole set with per-worker
//! resource accounting.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  WorkerSpec  │   │  WorkerSpec  │   │  WorkerSpec  │
//!     │ (worker #1)  │   │ (worker #2)  │   │ (worker #3)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (runtime orchestrator)                                │
//! │  - Bus (broadcast events)                                         │
//! │  - WatchTable (pid / pulse flag / generation per slot)            │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - HeartbeatChannel (signalfd drain for worker pulses)            │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!    child #1           child #2           child #3    (real processes)
//!        │                  │                  │
//!        │   SIGRTMIN pulses, sender pid attached
//!        └────────┬─────────┴──────────────────┘
//!                 ▼
//!         HeartbeatChannel ──► WatchTable::mark_alive(sender pid)
//!
//!   Monitor (fixed cadence) ──► verdicts, kills, respawns ──► Events
//!                                                               │
//!                                                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                    (capacity: Config::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │   (in Supervisor)      │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!            ┌─────────────────────┼─────────────────────┐
//!            ▼                     ▼                     ▼
//!       sub1.on_event()       sub2.on_event()       subN.on_event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! Config ──► daemonize() + block_heartbeat_signal()   (before the runtime)
//!        ──► Supervisor::run()
//!
//! run:
//!   ├─► spawn each slot (argv: supervisor pid, pulse interval seconds)
//!   │
//!   ├─► loop every check_interval:
//!   │     ├─ exited?         ─► WorkerCrashed ─► account ─► respawn
//!   │     ├─ no pulse seen?  ─► WorkerHung ─► SIGKILL ─► account ─► respawn
//!   │     └─ pulsed          ─► WorkerHealthy ─► clear pulse flag
//!   │   (respawn failure ─► SpawnFailed ─► run token cancelled)
//!   │
//!   └─► on cancel (SIGINT / SIGTERM / run_token):
//!         each slot: SIGTERM ─► wait up to grace ─► SIGKILL if needed
//!                    ─► WorkerReaped { rss_kb, cpu_ms } or ReapSkipped
//!         publish AllReaped, flush subscribers, return
//! ```
//!
//! ## Features
//! | Area               | Description                                                          | Key types / traits              |
//! |--------------------|----------------------------------------------------------------------|---------------------------------|
//! | **Supervision**    | Daemonized watchdog over a fixed set of worker processes.            | [`Supervisor`], [`Config`]      |
//! | **Heartbeats**     | Workers pulse the first realtime signal; a signalfd drain routes the sender pid to its slot. | [`heartbeat::HeartbeatChannel`] |
//! | **Health verdicts**| Crash and hang detection with kill-and-respawn and generation counts.| [`WatchTable`], [`WorkerSlot`]  |
//! | **Subscriber API** | Hook into lifecycle events (logging, metrics, custom sinks).         | [`Subscribe`], [`Event`]        |
//! | **Errors**         | Typed errors with stable labels for the runtime edge.                | [`RuntimeError`]                |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{heartbeat, Config, LogWriter, Subscribe, Supervisor, WorkerSpec};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The heartbeat signal must be blocked before any runtime thread
//!     // exists, otherwise a pulse could be delivered instead of queued.
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
//!         Supervisor::new(cfg, subs)?.run().await?;
//!         Ok(())
//!     })
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("procvisor requires Linux: the heartbeat channel is built on signalfd");

mod config;
mod core;
mod daemon;
mod error;
mod events;
pub mod heartbeat;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use config::Config;
pub use core::Supervisor;
pub use daemon::{daemonize, DaemonStage};
pub use error::RuntimeError;
pub use events::{Bus, Event, EventKind};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use workers::{WatchTable, WorkerSlot, WorkerSpec, MAX_WORKERS};
