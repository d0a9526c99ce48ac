//! # Demo: watchdog
//!
//! Runs the supervisor undetached over two workers that never pulse, so
//! every check cycle verdicts them as hung, kills them, and relaunches
//! them. After a few cycles the run token is cancelled and the reap
//! sequence collects whatever is still running.
//!
//! Shows how to:
//! - Build a [`Config`] in code instead of loading a file.
//! - Order startup correctly (block the heartbeat signal, then build the
//!   runtime, then [`Supervisor::run`]).
//! - Watch the event stream via the built-in [`LogWriter`].
//!
//! ## Run
//! ```bash
//! cargo run --example watchdog
//! ```

use std::sync::Arc;
use std::time::Duration;

use procvisor::{heartbeat, Config, LogWriter, Subscribe, Supervisor, WorkerSpec};

fn main() -> anyhow::Result<()> {
    // Pulses queue in the kernel only if the signal is blocked before any
    // runtime thread exists.
    heartbeat::block_heartbeat_signal()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut cfg = Config::default();
    cfg.check_interval = Duration::from_secs(2);
    cfg.grace = Duration::from_secs(3);
    // /bin/sleep takes the two launch-contract arguments as durations and
    // never pulses back: a convenient stand-in for a hung worker.
    cfg.workers.push(WorkerSpec::new("sleeper-a", "/bin/sleep", None));
    cfg.workers.push(WorkerSpec::new("sleeper-b", "/bin/sleep", None));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
        let supervisor = Supervisor::new(cfg, subs)?;

        // Bounded demo run; a real deployment would let OS signals end it.
        let token = supervisor.run_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(9)).await;
            println!("[demo] cancelling the run token");
            token.cancel();
        });

        supervisor.run().await?;
        println!("[demo] all workers reaped, done");
        Ok(())
    })
}
