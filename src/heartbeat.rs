//! # The liveness signal channel.
//!
//! Workers prove liveness by sending the first real-time signal
//! (`SIGRTMIN`) to the supervisor. Real-time signals queue in the kernel
//! per sender instead of coalescing into a single pending bit, and each
//! queued entry carries the sender's pid, which is what lets one signal
//! number serve an arbitrary number of workers.
//!
//! procvisor never installs a signal handler for pulses. Instead the
//! signal is **blocked** in every thread and drained through a `signalfd`:
//!
//! ```text
//!   worker ── kill(supervisor, SIGRTMIN) ──► kernel queue ──► signalfd
//!                                                               │
//!                                         drain task ── read ───┘
//!                                              │
//!                                   WatchTable::mark_alive(ssi_pid)
//! ```
//!
//! This keeps pulse handling in ordinary async code (no async-signal-safety
//! constraints) and makes delivery edge-proof: pulses that arrive while the
//! drain task is busy stay queued. When the kernel's queue limit is hit,
//! excess pulses from the same sender are dropped, which is harmless here:
//! the health check only asks whether *at least one* pulse arrived per
//! interval.
//!
//! ## Ordering requirement
//! [`block_heartbeat_signal`] must run on the main thread **before** the
//! async runtime is built. Signal masks are inherited at thread creation,
//! so blocking first is what guarantees no runtime thread ever takes the
//! default (fatal) disposition for `SIGRTMIN`.
//!
//! `signalfd` is a Linux facility; the crate is gated accordingly in
//! `lib.rs`.

use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use nix::unistd::Pid;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::RuntimeError;
use crate::workers::WatchTable;

/// The signal number workers pulse: the first real-time signal.
///
/// `SIGRTMIN` is resolved at runtime (libc reserves a few low RT slots for
/// its own use), hence a function rather than a constant.
pub fn heartbeat_signal() -> i32 {
    libc::SIGRTMIN()
}

/// Sends one liveness pulse to `target`.
///
/// This is the worker half of the contract; the `pulse-worker` binary calls
/// it once per heartbeat interval with its parent's pid.
pub fn pulse(target: Pid) -> io::Result<()> {
    let rc = unsafe { libc::kill(target.as_raw(), heartbeat_signal()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Blocks the heartbeat signal for the calling thread.
///
/// Call on the main thread before the tokio runtime is created so every
/// spawned thread inherits the mask. Once blocked, pulses queue in the
/// kernel until [`HeartbeatChannel`] reads them.
pub fn block_heartbeat_signal() -> Result<(), RuntimeError> {
    let set = heartbeat_sigset()?;
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(RuntimeError::HeartbeatChannel {
            source: io::Error::from_raw_os_error(rc),
        });
    }
    Ok(())
}

fn heartbeat_sigset() -> Result<libc::sigset_t, RuntimeError> {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    let rc = unsafe {
        libc::sigemptyset(set.as_mut_ptr()) | libc::sigaddset(set.as_mut_ptr(), heartbeat_signal())
    };
    if rc != 0 {
        return Err(RuntimeError::HeartbeatChannel {
            source: io::Error::last_os_error(),
        });
    }
    Ok(unsafe { set.assume_init() })
}

/// The supervisor half of the pulse contract: a non-blocking `signalfd`
/// over the heartbeat signal, registered with the async reactor.
pub struct HeartbeatChannel {
    fd: AsyncFd<OwnedFd>,
}

impl HeartbeatChannel {
    /// Opens the signal descriptor.
    ///
    /// The descriptor is non-blocking and close-on-exec, so spawned workers
    /// never inherit it.
    pub fn open() -> Result<Self, RuntimeError> {
        let set = heartbeat_sigset()?;
        let raw = unsafe { libc::signalfd(-1, &set, libc::SFD_NONBLOCK | libc::SFD_CLOEXEC) };
        if raw < 0 {
            return Err(RuntimeError::HeartbeatChannel {
                source: io::Error::last_os_error(),
            });
        }
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };
        let fd = AsyncFd::with_interest(owned, Interest::READABLE)
            .map_err(|source| RuntimeError::HeartbeatChannel { source })?;
        Ok(Self { fd })
    }

    /// Drains pulses into the watch table until the run token is cancelled.
    ///
    /// Every queued `signalfd_siginfo` is routed by its sender pid through
    /// [`WatchTable::mark_alive`]; pulses from pids the table does not
    /// currently hold (stale generations, strangers) are dropped.
    pub async fn run(self, table: Arc<WatchTable>, token: CancellationToken) {
        'poll: loop {
            let mut guard = tokio::select! {
                _ = token.cancelled() => break,
                ready = self.fd.readable() => match ready {
                    Ok(guard) => guard,
                    Err(err) => {
                        warn!(error = %err, "heartbeat channel lost");
                        break;
                    }
                },
            };

            // Drain everything queued before sleeping again.
            loop {
                match guard.try_io(|fd| read_siginfo(fd.get_ref().as_raw_fd())) {
                    Ok(Ok(info)) => {
                        let sender = Pid::from_raw(info.ssi_pid as i32);
                        match table.mark_alive(sender) {
                            Some(slot) => {
                                trace!(pid = sender.as_raw(), slot, "pulse");
                            }
                            None => {
                                debug!(pid = sender.as_raw(), "pulse from unwatched pid ignored");
                            }
                        }
                    }
                    Ok(Err(err)) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Ok(Err(err)) => {
                        // A failed read leaves the fd's readiness set, so
                        // retrying would spin; the channel is done.
                        warn!(error = %err, "heartbeat read failed, channel closed");
                        break 'poll;
                    }
                    Err(_would_block) => break,
                }
            }
        }
    }
}

/// Reads exactly one `signalfd_siginfo` record.
fn read_siginfo(fd: RawFd) -> io::Result<libc::signalfd_siginfo> {
    let mut info = MaybeUninit::<libc::signalfd_siginfo>::uninit();
    let len = std::mem::size_of::<libc::signalfd_siginfo>();
    let n = unsafe { libc::read(fd, info.as_mut_ptr().cast(), len) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    if n as usize != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "short signalfd read",
        ));
    }
    Ok(unsafe { info.assume_init() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerSpec;
    use std::time::Duration;

    fn one_slot_table() -> Arc<WatchTable> {
        Arc::new(WatchTable::new(&[WorkerSpec::new("self", "/bin/true", None)]))
    }

    // These tests stay on a current_thread runtime: `raise` queues the
    // pulse for the calling thread, and the signalfd must be read from
    // that same thread to observe it.

    #[tokio::test]
    async fn test_drain_routes_own_pulse() {
        block_heartbeat_signal().unwrap();
        let chan = HeartbeatChannel::open().unwrap();

        let table = one_slot_table();
        let slot = table.slot(0);
        slot.record_spawn(Pid::this(), false);
        slot.clear_alive();

        unsafe {
            libc::raise(heartbeat_signal());
        }

        let token = CancellationToken::new();
        let drain = tokio::spawn(chan.run(Arc::clone(&table), token.clone()));

        let routed = tokio::time::timeout(Duration::from_secs(2), async {
            while !table.slot(0).alive() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(routed.is_ok(), "pulse was not routed to the slot");

        token.cancel();
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_on_cancel() {
        block_heartbeat_signal().unwrap();
        let chan = HeartbeatChannel::open().unwrap();
        let token = CancellationToken::new();
        let drain = tokio::spawn(chan.run(one_slot_table(), token.clone()));

        token.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(2), drain).await;
        assert!(joined.is_ok(), "drain task did not stop on cancel");
    }

    #[test]
    fn test_read_siginfo_rejects_short_reads() {
        // A descriptor that cannot yield a whole record must surface an
        // error (the drain loop then closes the channel instead of
        // treating the bytes as a pulse).
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let byte = [1u8];
        unsafe {
            libc::write(fds[1], byte.as_ptr().cast(), 1);
            libc::close(fds[1]);
        }

        let err = read_siginfo(fds[0]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        unsafe {
            libc::close(fds[0]);
        }
    }

    #[test]
    fn test_heartbeat_signal_is_realtime() {
        let sig = heartbeat_signal();
        assert!(sig >= libc::SIGRTMIN());
        assert!(sig <= libc::SIGRTMAX());
    }
}
