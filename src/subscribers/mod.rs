//! # Event subscribers for the procvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Monitor/Spawner/Reaper ── publish(Event) ──► Bus
//!                                                 │
//!                              subscriber_listener (in Supervisor)
//!                                                 │
//!                                          SubscriberSet::emit
//!                                                 │
//!                                   ┌─────────────┼─────────────┐
//!                                   ▼             ▼             ▼
//!                               LogWriter      Metrics       Custom ...
//!                            (bounded queue per subscriber, own worker task)
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use procvisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct MetricsSubscriber;
//!
//! #[async_trait]
//! impl Subscribe for MetricsSubscriber {
//!     async fn on_event(&self, event: &Event) {
//!         match event.kind {
//!             EventKind::WorkerCrashed => {
//!                 // increment crash counter
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
