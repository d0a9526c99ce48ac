//! The `procvisor` binary: a daemonized watchdog over configured workers.
//!
//! `procvisor daemon` loads the configuration, detaches from the terminal,
//! blocks the heartbeat signal, and runs the supervisor until termination.
//! Configuration problems are reported before detaching so the operator
//! sees them; everything after the double fork goes to the log sink.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use procvisor::{heartbeat, Config, LogWriter, RuntimeError, Subscribe, Supervisor};

const DEFAULT_CONFIG_PATH: &str = "/etc/procvisor/procvisor.json";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [cmd] if cmd == "daemon" => {}
        _ => {
            eprintln!("usage: procvisor daemon");
            eprintln!();
            eprintln!("environment:");
            eprintln!("  PROCVISOR_CONFIG  configuration file (default {DEFAULT_CONFIG_PATH})");
            eprintln!("  PROCVISOR_LOG     log filter (default \"info\")");
            std::process::exit(2);
        }
    }

    if let Err(err) = run() {
        // Reaches the terminal before daemonization and the log sink after;
        // whichever phase failed, one of the two is live.
        tracing::error!(error = %format!("{err:#}"), "supervisor failed");
        eprintln!("procvisor: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let path = std::env::var_os("PROCVISOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let cfg = Config::from_file(&path).context("loading configuration")?;

    // Detach only once the configuration is known good, and fork before
    // the runtime exists: a forked thread pool would not survive.
    procvisor::daemonize().context("daemonizing")?;
    heartbeat::block_heartbeat_signal().context("blocking the heartbeat signal")?;
    init_logging(&cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?;
    rt.block_on(async {
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
        let supervisor = Supervisor::new(cfg, subs)?;
        tracing::info!(pid = std::process::id(), "procvisor started");
        supervisor.run().await?;
        Ok::<(), RuntimeError>(())
    })?;
    tracing::info!("procvisor stopped");
    Ok(())
}

/// Installs the global `tracing` subscriber.
///
/// A daemonized supervisor has `/dev/null` stdio, so a configured
/// `log_file` (append mode, ANSI off) is the operational default; stderr
/// is only useful when embedding or debugging undetached.
fn init_logging(cfg: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PROCVISOR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match &cfg.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
