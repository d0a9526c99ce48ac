//! Runtime core: orchestration and lifecycle.
//!
//! This module contains the internals of the procvisor runtime. The only
//! public API from this module is [`Supervisor`], which orchestrates
//! worker launch, health verdicts, and the final reap.
//!
//! Internal modules:
//! - [`spawner`]: launches workers into table slots and publishes spawn outcomes;
//! - [`monitor`]: periodic verdict loop (healthy / crashed / hung) with
//!   kill-and-respawn handling;
//! - [`reaper`]: end-of-run collection (SIGTERM, grace, SIGKILL) with
//!   resource accounting;
//! - [`shutdown`]: termination signal handling bridged onto the run token;
//! - [`supervisor`]: wires the bus, subscriber fan-out, heartbeat drain,
//!   and the pieces above into one watchdog run.

mod monitor;
mod reaper;
mod shutdown;
mod spawner;
mod supervisor;

pub use supervisor::Supervisor;
