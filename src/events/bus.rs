//! # Broadcast bus for worker lifecycle events.
//!
//! Every observable transition of the watchdog (spawn, verdict, reap,
//! shutdown request) is published here as an [`Event`]. The bus carries
//! diagnostics only: supervision decisions never depend on whether anyone
//! is listening, and heartbeat pulses never pass through it.
//!
//! ```text
//! Spawner  ──┐
//! Monitor  ──┼─► Bus ─► subscriber_listener ─► SubscriberSet ─► sinks
//! Reaper   ──┤
//! Shutdown ──┘
//! ```
//!
//! Delivery is best-effort over a bounded ring: a publish never waits, a
//! receiver that falls behind sees `RecvError::Lagged(n)` and resumes with
//! the events still buffered, and an event published while no receiver
//! exists is simply gone. Within one receiver, events arrive in publish
//! order; [`Event::seq`](super::Event) orders them across receivers.

use tokio::sync::broadcast;

use super::event::Event;

/// Handle for publishing and subscribing to lifecycle events.
///
/// Clones share one underlying channel, so every runtime task can carry
/// its own handle. Dropping the last clone closes the channel, which is
/// how the supervisor tells its listener that no more events can come.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events.
    ///
    /// The buffer is shared by all receivers. A capacity of zero is
    /// clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes one event to whoever is currently subscribed.
    ///
    /// Returns immediately in all cases, including when there is no
    /// receiver to take the event.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Opens an independent receiver.
    ///
    /// The receiver observes only events published after this call; it
    /// does not replay the ring's history.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::EventKind;

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::WorkerSpawned).with_worker("core"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::WorkerSpawned);
        assert_eq!(ev.worker.as_deref(), Some("core"));
    }

    #[tokio::test]
    async fn test_publish_without_receivers_is_silent() {
        let bus = Bus::new(8);
        // No receivers: the event is dropped, publish does not block or error.
        bus.publish(Event::new(EventKind::AllReaped));
    }
}
