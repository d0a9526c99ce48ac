//! # The reap sequence.
//!
//! [`reap_all`] is the supervisor's final act: terminate every remaining
//! worker, collect every exit, account resource usage, and announce
//! completion. It runs exactly once per supervisor run, after the
//! health-check loop has observed cancellation, and it processes **every**
//! slot regardless of what happens on the others.
//!
//! ## Per-slot sequence
//! ```text
//!   SIGTERM ──► wait up to grace ──► collected   ──► WorkerReaped
//!        │             │
//!        │             └─ timeout ──► GraceExceeded, SIGKILL, wait ──► WorkerReaped
//!        └─ ESRCH ──► ReapSkipped (process already gone)
//! ```
//!
//! ## Collection
//! Exits are collected with `wait4` ([`collect_child`]), not through the
//! tokio child handle: `wait4` is the only wait variant that reports the
//! dead process's own resource usage (peak RSS, user CPU), which is what
//! the reap and verdict events carry. The poll is `WNOHANG` at a short
//! cadence, so the runtime never blocks and a grace timeout can cancel the
//! wait without losing the exit (an uncollected exit stays collectable as
//! a zombie).
//!
//! The slot's pid is safe to signal here even though the process may have
//! exited long ago: nothing reaps monitor-held children except `wait4` in
//! this module, so until collection the pid stays pinned (as a zombie at
//! worst) and cannot have been reused.

use std::io;
use std::mem::MaybeUninit;
use std::process::ExitStatus;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::time::{self, timeout};
use tracing::{debug, warn};

use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::workers::WatchTable;

/// Cadence of the `WNOHANG` polls inside [`collect_child`].
const COLLECT_POLL: Duration = Duration::from_millis(20);

/// One collected exit: status plus the dead process's own resource usage.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Collected {
    pub status: ExitStatus,
    /// Peak resident set size, KiB.
    pub rss_kb: u64,
    /// Accumulated user CPU time, milliseconds.
    pub cpu_ms: u64,
}

/// Non-blocking collection attempt for `pid`.
///
/// Returns `Ok(None)` while the process is still running. A `Some` return
/// means the pid has been reaped; it must not be waited on again.
pub(crate) fn try_collect_child(pid: Pid) -> io::Result<Option<Collected>> {
    use std::os::unix::process::ExitStatusExt;

    let mut status: libc::c_int = 0;
    let mut usage = MaybeUninit::<libc::rusage>::zeroed();
    let rc = unsafe { libc::wait4(pid.as_raw(), &mut status, libc::WNOHANG, usage.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    if rc == 0 {
        return Ok(None);
    }
    let usage = unsafe { usage.assume_init() };
    let cpu_ms =
        usage.ru_utime.tv_sec.max(0) as u64 * 1000 + usage.ru_utime.tv_usec.max(0) as u64 / 1000;
    Ok(Some(Collected {
        status: ExitStatus::from_raw(status),
        rss_kb: usage.ru_maxrss.max(0) as u64,
        cpu_ms,
    }))
}

/// Waits for `pid` to exit and collects it with its resource usage.
///
/// Cancel-safe: dropping the future between polls leaves the exit pending
/// for a later collection attempt.
pub(crate) async fn collect_child(pid: Pid) -> io::Result<Collected> {
    loop {
        match try_collect_child(pid)? {
            Some(collected) => return Ok(collected),
            None => time::sleep(COLLECT_POLL).await,
        }
    }
}

/// Terminates and collects every remaining worker, then publishes
/// [`EventKind::AllReaped`].
///
/// Slots are processed in table order. A slot whose process is already
/// gone yields [`EventKind::ReapSkipped`]; one that outlives the grace
/// period yields [`EventKind::GraceExceeded`] and is force-killed. Either
/// way the slot ends vacant and the loop moves on.
pub(crate) async fn reap_all(
    cfg: &Config,
    bus: &Bus,
    table: &WatchTable,
    children: &mut [Option<Child>],
) {
    for (i, slot) in table.iter() {
        let Some(mut child) = children[i].take() else {
            continue;
        };
        let Some(pid) = slot.pid() else {
            warn!(worker = slot.name(), "slot vacant but child handle retained, collecting");
            let _ = child.start_kill();
            let _ = child.wait().await;
            continue;
        };
        let name = slot.spec().name_arc();

        match kill(pid, Signal::SIGTERM) {
            Err(Errno::ESRCH) => {
                bus.publish(
                    Event::new(EventKind::ReapSkipped)
                        .with_worker(name)
                        .with_pid(pid.as_raw()),
                );
                // The handle's process is gone too; collect it so no
                // zombie outlives the reap.
                let _ = child.wait().await;
                slot.clear();
                continue;
            }
            Err(err) => {
                warn!(
                    worker = slot.name(),
                    pid = pid.as_raw(),
                    error = %err,
                    "SIGTERM delivery failed, waiting anyway"
                );
            }
            Ok(()) => {}
        }

        let collected = match timeout(cfg.grace, collect_child(pid)).await {
            Ok(res) => res,
            Err(_elapsed) => {
                bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_worker(name.clone())
                        .with_pid(pid.as_raw()),
                );
                if let Err(err) = kill(pid, Signal::SIGKILL) {
                    warn!(
                        worker = slot.name(),
                        pid = pid.as_raw(),
                        error = %err,
                        "SIGKILL after grace failed"
                    );
                }
                // SIGKILL cannot be ignored; this wait is bounded by the
                // kernel actually tearing the process down.
                collect_child(pid).await
            }
        };

        match collected {
            Ok(c) => {
                debug!(
                    worker = slot.name(),
                    pid = pid.as_raw(),
                    status = %describe_exit(c.status),
                    "worker collected"
                );
                bus.publish(
                    Event::new(EventKind::WorkerReaped)
                        .with_worker(name)
                        .with_pid(pid.as_raw())
                        .with_usage(c.rss_kb, c.cpu_ms),
                );
            }
            Err(err) => {
                warn!(
                    worker = slot.name(),
                    pid = pid.as_raw(),
                    error = %err,
                    "wait failed during reap"
                );
            }
        }
        slot.clear();
        drop(child);
    }

    bus.publish(Event::new(EventKind::AllReaped));
}

/// Renders an [`ExitStatus`] for events and logs.
pub(crate) fn describe_exit(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        format!("exit status: {code}")
    } else if let Some(sig) = status.signal() {
        format!("killed by signal: {sig}")
    } else {
        "unknown exit".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spawner::Spawner;
    use crate::workers::{WatchTable, WorkerSpec};
    use std::time::Instant;
    use tokio::process::Command;

    fn drain_kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn test_reap_all_collects_live_workers() {
        let cfg = Config::default();
        let bus = Bus::new(64);
        let spawner = Spawner::new(cfg.clone(), bus.clone());
        let table = WatchTable::new(&[
            WorkerSpec::new("a", "/bin/sleep", None),
            WorkerSpec::new("b", "/bin/sleep", None),
        ]);

        let mut children = vec![
            Some(spawner.spawn_into(table.slot(0), false).unwrap()),
            Some(spawner.spawn_into(table.slot(1), false).unwrap()),
        ];
        let mut rx = bus.subscribe();

        reap_all(&cfg, &bus, &table, &mut children).await;

        let kinds = drain_kinds(&mut rx);
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == EventKind::WorkerReaped)
                .count(),
            2
        );
        assert_eq!(kinds.last(), Some(&EventKind::AllReaped));
        assert!(children.iter().all(Option::is_none));
        assert!(table.slot(0).pid().is_none());
        assert!(table.slot(1).pid().is_none());
    }

    #[tokio::test]
    async fn test_reap_skips_vanished_process() {
        let cfg = Config::default();
        let bus = Bus::new(64);
        let table = WatchTable::new(&[WorkerSpec::new("ghost", "/bin/true", None)]);

        // A real child for the handle, but the slot records a pid that no
        // process holds, so SIGTERM delivery fails with ESRCH.
        let child = Command::new("/bin/true").spawn().unwrap();
        table.slot(0).record_spawn(Pid::from_raw(999_999), false);
        let mut children = vec![Some(child)];
        let mut rx = bus.subscribe();

        reap_all(&cfg, &bus, &table, &mut children).await;

        let kinds = drain_kinds(&mut rx);
        assert_eq!(kinds, vec![EventKind::ReapSkipped, EventKind::AllReaped]);
        assert!(table.slot(0).pid().is_none());
    }

    #[tokio::test]
    async fn test_reap_escalates_when_sigterm_ignored() {
        let mut cfg = Config::default();
        cfg.grace = Duration::from_millis(300);
        let bus = Bus::new(64);
        let table = WatchTable::new(&[WorkerSpec::new("stubborn", "/bin/sh", None)]);

        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg("trap '' TERM; exec sleep 30")
            .spawn()
            .unwrap();
        let pid = Pid::from_raw(child.id().unwrap() as i32);
        table.slot(0).record_spawn(pid, false);
        let mut children = vec![Some(child)];
        let mut rx = bus.subscribe();

        // The shell must install `trap '' TERM` before reap_all's SIGTERM
        // arrives, or the child dies within grace and never escalates. The
        // trap is in place once the shell has exec'd into sleep.
        let ready = Instant::now();
        loop {
            let comm = std::fs::read_to_string(format!("/proc/{}/comm", pid.as_raw()));
            if matches!(comm, Ok(ref c) if c.trim() == "sleep") {
                break;
            }
            assert!(
                ready.elapsed() < Duration::from_secs(5),
                "child never exec'd into sleep"
            );
            time::sleep(Duration::from_millis(10)).await;
        }

        let started = Instant::now();
        reap_all(&cfg, &bus, &table, &mut children).await;
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "escalation should not take anywhere near the worker's own runtime"
        );

        let kinds = drain_kinds(&mut rx);
        assert_eq!(
            kinds,
            vec![
                EventKind::GraceExceeded,
                EventKind::WorkerReaped,
                EventKind::AllReaped
            ]
        );
        assert!(table.slot(0).pid().is_none());
    }

    #[tokio::test]
    async fn test_reap_with_no_children_still_announces() {
        let cfg = Config::default();
        let bus = Bus::new(8);
        let table = WatchTable::new(&[WorkerSpec::new("idle", "/bin/true", None)]);
        let mut children = vec![None];
        let mut rx = bus.subscribe();

        reap_all(&cfg, &bus, &table, &mut children).await;
        assert_eq!(drain_kinds(&mut rx), vec![EventKind::AllReaped]);
    }

    #[tokio::test]
    async fn test_collect_child_reports_exit_and_own_usage() {
        let child = Command::new("/bin/true").spawn().unwrap();
        let pid = Pid::from_raw(child.id().unwrap() as i32);

        let collected = collect_child(pid).await.unwrap();
        assert!(collected.status.success());
        // ru_maxrss of a process that actually ran is never zero, and a
        // just-exited /bin/true stays nowhere near the supervisor's own
        // footprint, which a cumulative snapshot would report instead.
        assert!(collected.rss_kb > 0);
        assert!(collected.rss_kb < 100_000);
        drop(child);
    }

    #[tokio::test]
    async fn test_collect_child_pending_while_running() {
        let child = Command::new("/bin/sleep").arg("30").spawn().unwrap();
        let pid = Pid::from_raw(child.id().unwrap() as i32);

        assert!(try_collect_child(pid).unwrap().is_none());

        kill(pid, Signal::SIGKILL).unwrap();
        let collected = collect_child(pid).await.unwrap();
        assert_eq!(describe_exit(collected.status), "killed by signal: 9");
        drop(child);
    }

    #[test]
    fn test_describe_exit_formats() {
        use std::os::unix::process::ExitStatusExt;
        let by_code = ExitStatus::from_raw(0x100); // exit(1)
        assert_eq!(describe_exit(by_code), "exit status: 1");
        let by_signal = ExitStatus::from_raw(9); // SIGKILL
        assert_eq!(describe_exit(by_signal), "killed by signal: 9");
    }
}
