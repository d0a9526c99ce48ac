//! # The health-check loop.
//!
//! [`Monitor`] owns the per-slot child handles and drives the fixed-cadence
//! verdict cycle:
//!
//! ```text
//! loop {
//!   sleep(check_interval)            (cancellable)
//!   for each slot:                   (run token checked before each)
//!     ├─ exited?        ──► Crashed  ──► account, publish, respawn
//!     ├─ no pulse seen? ──► Hung     ──► SIGKILL, collect, account,
//!     │                                  publish, respawn
//!     └─ otherwise      ──► Healthy  ──► publish, clear pulse flag
//! }
//! ```
//!
//! ## Verdict rules
//! - **Crash wins**: a worker that exited is a crash even if a pulse also
//!   arrived this interval; collection is consulted before the pulse flag.
//! - The pulse flag is cleared only on the healthy branch; crashed and
//!   hung slots get their flag re-armed by the respawn grace instead.
//! - Respawn happens synchronously inside the same iteration, so a slot is
//!   never left vacant across a cycle boundary — unless a termination
//!   request arrived, in which case the slot stays vacant and the reap
//!   sequence takes over.
//! - A failed respawn escalates: the run token is cancelled and the loop
//!   winds down into the reap sequence.
//!
//! Exits are detected and collected with the reaper's `wait4` helpers, so
//! crash and hang events carry the dead process's own resource usage. The
//! monitor is the only holder of the child handles and nothing else waits
//! on them, so a slot's pid cannot be reused while its handle is held and
//! signalling by pid is safe.

use std::sync::Arc;

use nix::sys::signal::{kill, Signal};
use tokio::process::Child;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::reaper::{collect_child, describe_exit, try_collect_child, Collected};
use super::spawner::Spawner;
use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::workers::WatchTable;

/// Outcome of one slot's verdict window.
#[derive(Debug)]
pub(crate) enum Verdict {
    /// Process running and pulsed at least once since the last clear.
    Healthy,
    /// Process exited on its own; carries the collected exit.
    Crashed(Collected),
    /// Process running but silent for a full interval.
    Hung,
}

/// Classifies one slot from its collected-exit state and pulse flag.
///
/// Exit takes precedence over the pulse flag: a worker that pulsed and
/// then died within the same interval is a crash, not a healthy worker.
pub(crate) fn classify(exited: Option<Collected>, alive: bool) -> Verdict {
    match exited {
        Some(collected) => Verdict::Crashed(collected),
        None if alive => Verdict::Healthy,
        None => Verdict::Hung,
    }
}

/// Drives the verdict cycle until the run token is cancelled, then yields
/// the remaining child handles to the reap sequence.
pub(crate) struct Monitor {
    cfg: Config,
    bus: Bus,
    spawner: Spawner,
    table: Arc<WatchTable>,
    children: Vec<Option<Child>>,
    token: CancellationToken,
}

impl Monitor {
    pub(crate) fn new(
        cfg: Config,
        bus: Bus,
        spawner: Spawner,
        table: Arc<WatchTable>,
        children: Vec<Option<Child>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            spawner,
            table,
            children,
            token,
        }
    }

    /// Runs check cycles until cancellation.
    ///
    /// Each cycle sleeps first, then verdicts every slot in table order.
    /// Returns the child handles still held so the caller can reap them.
    pub(crate) async fn run(mut self) -> Vec<Option<Child>> {
        loop {
            let sleep = time::sleep(self.cfg.check_interval);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                _ = self.token.cancelled() => break,
            }

            for i in 0..self.table.len() {
                if self.token.is_cancelled() {
                    break;
                }
                self.check_slot(i).await;
            }
            if self.token.is_cancelled() {
                break;
            }
        }
        self.children
    }

    /// Verdicts one slot and applies the outcome.
    async fn check_slot(&mut self, i: usize) {
        let table = Arc::clone(&self.table);
        let slot = table.slot(i);
        if self.children[i].is_none() {
            return;
        }
        let Some(pid) = slot.pid() else {
            return;
        };

        let exited = match try_collect_child(pid) {
            Ok(res) => res,
            Err(err) => {
                warn!(worker = slot.name(), error = %err, "exit check failed");
                None
            }
        };

        match classify(exited, slot.alive()) {
            Verdict::Healthy => {
                self.bus.publish(
                    Event::new(EventKind::WorkerHealthy)
                        .with_worker(slot.spec().name_arc())
                        .with_pid(pid.as_raw()),
                );
                slot.clear_alive();
            }
            Verdict::Crashed(c) => {
                self.bus.publish(
                    Event::new(EventKind::WorkerCrashed)
                        .with_worker(slot.spec().name_arc())
                        .with_pid(pid.as_raw())
                        .with_generation(slot.generation())
                        .with_reason(describe_exit(c.status))
                        .with_usage(c.rss_kb, c.cpu_ms),
                );
                self.respawn(i);
            }
            Verdict::Hung => {
                if let Err(err) = kill(pid, Signal::SIGKILL) {
                    warn!(worker = slot.name(), error = %err, "kill of hung worker failed");
                }
                let mut ev = Event::new(EventKind::WorkerHung)
                    .with_worker(slot.spec().name_arc())
                    .with_pid(pid.as_raw())
                    .with_generation(slot.generation());
                // Bounded: SIGKILL is non-catchable.
                match collect_child(pid).await {
                    Ok(c) => {
                        debug!(
                            worker = slot.name(),
                            status = %describe_exit(c.status),
                            "hung worker collected"
                        );
                        ev = ev.with_usage(c.rss_kb, c.cpu_ms);
                    }
                    Err(err) => {
                        warn!(worker = slot.name(), error = %err, "wait after kill failed");
                    }
                }
                self.bus.publish(ev);
                self.respawn(i);
            }
        }
    }

    /// Relaunches a slot whose process is gone; escalates to shutdown if
    /// the relaunch fails.
    fn respawn(&mut self, i: usize) {
        self.children[i] = None;
        let table = Arc::clone(&self.table);
        let slot = table.slot(i);
        // A verdict handled mid-shutdown must not relaunch: the reap
        // sequence runs next and the slot's process is already collected.
        if self.token.is_cancelled() {
            slot.clear();
            return;
        }
        match self.spawner.spawn_into(slot, true) {
            Ok(child) => self.children[i] = Some(child),
            Err(err) => {
                error!(worker = slot.name(), error = %err, "respawn failed, shutting down");
                slot.clear();
                self.token.cancel();
            }
        }
    }
}
