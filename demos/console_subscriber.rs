//! # Demo: console_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for worker lifecycle transitions.
//! - Wire the subscriber into [`Supervisor::new`].
//!
//! ## Flow
//! ```text
//! WorkerSpec ──► Supervisor::run()
//!     ├─► Spawner: publish(WorkerSpawned | SpawnFailed)
//!     ├─► Monitor: publish(WorkerHealthy | WorkerCrashed | WorkerHung)
//!     ├─► Reaper:  publish(WorkerReaped | ReapSkipped | GraceExceeded | AllReaped)
//!     └─► subscriber_listener (in Supervisor)
//!           └─► SubscriberSet.emit() ──► ConsoleSubscriber.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example console_subscriber
//! ```

use std::sync::Arc;
use std::time::Duration;

use procvisor::{heartbeat, Config, Event, EventKind, Subscribe, Supervisor, WorkerSpec};

/// A simple console subscriber that prints selected events.
/// In real life, you could export metrics, ship logs, or trigger alerts.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let worker = ev.worker.as_deref().unwrap_or("<unknown>");
        match ev.kind {
            // === Lifecycle ===
            EventKind::WorkerSpawned => {
                println!(
                    "[sub] spawned:  worker={worker} pid={} generation={}",
                    ev.pid.unwrap_or(0),
                    ev.generation.unwrap_or(0)
                );
            }
            EventKind::WorkerHealthy => {
                println!("[sub] healthy:  worker={worker} pid={}", ev.pid.unwrap_or(0));
            }
            EventKind::WorkerCrashed => {
                println!(
                    "[sub] crashed:  worker={worker} pid={} reason={}",
                    ev.pid.unwrap_or(0),
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::WorkerHung => {
                println!(
                    "[sub] hung:     worker={worker} pid={} rss_kb={} cpu_ms={}",
                    ev.pid.unwrap_or(0),
                    ev.rss_kb.unwrap_or(0),
                    ev.cpu_ms.unwrap_or(0)
                );
            }
            EventKind::SpawnFailed => {
                println!(
                    "[sub] no spawn: worker={worker} reason={}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }

            // === Shutdown ===
            EventKind::ShutdownRequested => {
                println!(
                    "[sub] shutdown requested: {}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::WorkerReaped => {
                println!(
                    "[sub] reaped:   worker={worker} pid={} rss_kb={} cpu_ms={}",
                    ev.pid.unwrap_or(0),
                    ev.rss_kb.unwrap_or(0),
                    ev.cpu_ms.unwrap_or(0)
                );
            }
            EventKind::ReapSkipped => {
                println!("[sub] skipped:  worker={worker} (already gone)");
            }
            EventKind::GraceExceeded => {
                println!("[sub] grace exceeded: worker={worker}, force-killing");
            }
            EventKind::AllReaped => {
                println!("[sub] all workers reaped");
            }

            // === Ignored ===
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }

    fn queue_capacity(&self) -> usize {
        1024
    }
}

fn main() -> anyhow::Result<()> {
    heartbeat::block_heartbeat_signal()?;

    let mut cfg = Config::default();
    cfg.check_interval = Duration::from_secs(2);
    cfg.grace = Duration::from_secs(3);
    cfg.workers.push(WorkerSpec::new("quitter", "/bin/true", None));
    cfg.workers.push(WorkerSpec::new("sleeper", "/bin/sleep", None));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
        let supervisor = Supervisor::new(cfg, subs)?;

        let token = supervisor.run_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            token.cancel();
        });

        supervisor.run().await?;
        println!("\nfinished");
        Ok(())
    })
}
