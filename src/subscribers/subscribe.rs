//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for observing the watchdog: spawn and
//! reap records, health verdicts, shutdown progress. Each subscriber gets a
//! dedicated worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so a slow sink never
//! stalls the health-check loop.
//!
//! ## Contract
//! - Implementations may take their time (file I/O, batching, alert
//!   delivery); they block neither the publisher nor other subscribers.
//! - Each subscriber declares its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If the queue overflows, events for that
//!   subscriber are dropped with a warning.
//!
//! ## Example (skeleton)
//! ```rust
//! // use procvisor::{Subscribe, Event};
//! //
//! // struct Audit;
//! // #[async_trait::async_trait]
//! // impl Subscribe for Audit {
//! //     async fn on_event(&self, ev: &Event) {
//! //         // write audit record...
//! //     }
//! //     fn name(&self) -> &'static str { "audit" }
//! //     fn queue_capacity(&self) -> usize { 512 }
//! // }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should
/// avoid blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single watchdog event.
    ///
    /// The reference is to the fan-out copy; keep what you need by cloning.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are dropped with a warning.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
