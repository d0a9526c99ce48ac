//! # Worker abstractions and the shared watch table.
//!
//! This module provides the core worker-related types:
//! - [`WorkerSpec`] - immutable description of one supervised process
//! - [`WorkerSlot`] - one table entry: spec plus mutable liveness state
//! - [`WatchTable`] - fixed-capacity, slot-indexed arena shared by the
//!   heartbeat drain task and the health-check loop
//! - [`MAX_WORKERS`] - compile-time table capacity

mod spec;
mod table;

pub use spec::WorkerSpec;
pub use table::{WatchTable, WorkerSlot, MAX_WORKERS};
