//! # OS termination-signal handling.
//!
//! Provides [`wait_for_shutdown_signal`] an async helper that completes when
//! the process receives a termination signal, and [`watch`] which turns that
//! completion into a `ShutdownRequested` event plus run-token cancellation.
//!
//! ## Signals
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by init systems)
//!
//! The heartbeat signal is deliberately absent here: it is blocked and
//! drained through the [`HeartbeatChannel`](crate::heartbeat::HeartbeatChannel),
//! never handled.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::events::{Bus, Event, EventKind};

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Spawns the shutdown watcher task.
///
/// On the first termination signal it publishes
/// [`EventKind::ShutdownRequested`] and cancels `token`; the task also exits
/// quietly if the token is cancelled first (spawn-failure escalation).
///
/// A failure to register listeners is treated as a shutdown request too: a
/// supervisor that cannot hear termination must not keep running workers.
pub fn watch(bus: Bus, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            res = wait_for_shutdown_signal() => {
                let reason = match res {
                    Ok(()) => "termination signal",
                    Err(err) => {
                        warn!(error = %err, "signal listener registration failed");
                        "signal listener unavailable"
                    }
                };
                bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
                token.cancel();
            }
        }
    })
}
