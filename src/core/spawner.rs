//! # Worker launch.
//!
//! [`Spawner`] turns a [`WorkerSlot`]'s spec into a running child process
//! and records the launch in the slot.
//!
//! ## Launch contract
//! Every worker is executed as:
//! ```text
//!   <path> <supervisor-pid> <heartbeat-secs>
//! ```
//! `argv[1]` is the pid the worker must pulse, `argv[2]` the interval it
//! must pulse at. Workers that cannot honor the contract exit with
//! status 2.
//!
//! ## Failure detection
//! `tokio::process::Command::spawn` reports exec failures (missing binary,
//! permission denied) synchronously through its internal close-on-exec
//! pipe, so a worker that can fork but not exec surfaces here as an
//! ordinary [`RuntimeError::Spawn`] instead of as an instant first-cycle
//! crash.
//!
//! ## Slot effects of a successful launch
//! - `pid` is rewritten to the new process;
//! - `alive` is set (one full interval of grace before the first verdict);
//! - `generation` is bumped when `respawn` is true.

use std::io;

use nix::unistd::{getpid, Pid};
use tokio::process::{Child, Command};

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::workers::WorkerSlot;

/// Launches workers and records them in their slots.
pub(crate) struct Spawner {
    cfg: Config,
    bus: Bus,
}

impl Spawner {
    pub(crate) fn new(cfg: Config, bus: Bus) -> Self {
        Self { cfg, bus }
    }

    /// Launches the slot's worker and registers the new process.
    ///
    /// Publishes [`EventKind::WorkerSpawned`] on success and
    /// [`EventKind::SpawnFailed`] before returning an error. The slot is
    /// only touched on success; a failed launch leaves the previous state
    /// intact.
    pub(crate) fn spawn_into(
        &self,
        slot: &WorkerSlot,
        respawn: bool,
    ) -> Result<Child, RuntimeError> {
        let spec = slot.spec();
        let heartbeat = self.cfg.heartbeat_for(spec);
        let target = getpid();

        let attempted_generation = if respawn {
            slot.generation() + 1
        } else {
            slot.generation()
        };

        let spawned = Command::new(spec.path())
            .arg(target.to_string())
            .arg(heartbeat.as_secs().to_string())
            .spawn()
            .and_then(|child| match child.id() {
                Some(raw) => Ok((child, Pid::from_raw(raw as i32))),
                None => Err(io::Error::other("child exited before registration")),
            });

        match spawned {
            Ok((child, pid)) => {
                let generation = slot.record_spawn(pid, respawn);
                self.bus.publish(
                    Event::new(EventKind::WorkerSpawned)
                        .with_worker(spec.name_arc())
                        .with_pid(pid.as_raw())
                        .with_generation(generation),
                );
                Ok(child)
            }
            Err(source) => {
                self.bus.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_worker(spec.name_arc())
                        .with_generation(attempted_generation)
                        .with_reason(source.to_string()),
                );
                Err(RuntimeError::Spawn {
                    worker: spec.name().to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::{WatchTable, WorkerSpec};

    fn spawner_and_bus() -> (Spawner, crate::events::Bus) {
        let bus = Bus::new(64);
        (Spawner::new(Config::default(), bus.clone()), bus)
    }

    #[tokio::test]
    async fn test_spawn_into_records_slot_and_publishes() {
        let (spawner, bus) = spawner_and_bus();
        let mut rx = bus.subscribe();
        let table = WatchTable::new(&[WorkerSpec::new("sleeper", "/bin/sleep", None)]);
        let slot = table.slot(0);

        let mut child = spawner.spawn_into(slot, false).unwrap();
        let pid = slot.pid().expect("slot should hold the new pid");
        assert_eq!(Some(pid.as_raw() as u32), child.id());
        assert!(slot.alive(), "fresh spawn gets grace");
        assert_eq!(slot.generation(), 0);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::WorkerSpawned);
        assert_eq!(ev.worker.as_deref(), Some("sleeper"));
        assert_eq!(ev.pid, Some(pid.as_raw()));
        assert_eq!(ev.generation, Some(0));

        child.start_kill().unwrap();
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_failure_publishes_and_leaves_slot_vacant() {
        let (spawner, bus) = spawner_and_bus();
        let mut rx = bus.subscribe();
        let table = WatchTable::new(&[WorkerSpec::new("ghost", "/nonexistent/worker-bin", None)]);
        let slot = table.slot(0);

        let err = spawner.spawn_into(slot, false).unwrap_err();
        assert_eq!(err.as_label(), "spawn_failed");
        assert!(slot.pid().is_none());
        assert!(!slot.alive());

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::SpawnFailed);
        assert_eq!(ev.worker.as_deref(), Some("ghost"));
        assert_eq!(ev.generation, Some(0));
        assert!(ev.reason.is_some());
    }

    #[tokio::test]
    async fn test_respawn_bumps_generation() {
        let (spawner, bus) = spawner_and_bus();
        let mut rx = bus.subscribe();
        let table = WatchTable::new(&[WorkerSpec::new("sleeper", "/bin/sleep", None)]);
        let slot = table.slot(0);

        let mut first = spawner.spawn_into(slot, false).unwrap();
        let mut second = spawner.spawn_into(slot, true).unwrap();
        assert_eq!(slot.generation(), 1);
        assert_eq!(Some(slot.pid().unwrap().as_raw() as u32), second.id());

        let ev0 = rx.try_recv().unwrap();
        let ev1 = rx.try_recv().unwrap();
        assert_eq!(ev0.generation, Some(0));
        assert_eq!(ev1.generation, Some(1));
        assert!(ev0.seq < ev1.seq);

        for child in [&mut first, &mut second] {
            child.start_kill().unwrap();
            child.wait().await.unwrap();
        }
    }
}
