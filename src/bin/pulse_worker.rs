//! Demonstration worker honoring the launch contract.
//!
//! Spawned as `pulse-worker <supervisor-pid> <interval-secs>`: pulses the
//! heartbeat signal back at the given interval until killed. Setting
//! `PULSE_WORKER_STALL_AFTER=<n>` stops pulsing after `n` pulses while the
//! process keeps running, which makes hang detection observable end to end.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use nix::unistd::Pid;

use procvisor::heartbeat;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match args.as_slice() {
        [_, pid, secs] => pid
            .parse::<i32>()
            .ok()
            .zip(secs.parse::<u64>().ok())
            .filter(|(pid, secs)| *pid > 0 && *secs > 0),
        _ => None,
    };
    let Some((supervisor, secs)) = parsed else {
        eprintln!("usage: pulse-worker <supervisor-pid> <interval-secs>");
        return ExitCode::from(2);
    };

    let stall_after: Option<u64> = std::env::var("PULSE_WORKER_STALL_AFTER")
        .ok()
        .and_then(|v| v.parse().ok());

    let target = Pid::from_raw(supervisor);
    let interval = Duration::from_secs(secs);
    let mut pulses: u64 = 0;
    loop {
        let stalled = stall_after.is_some_and(|n| pulses >= n);
        if !stalled {
            if let Err(err) = heartbeat::pulse(target) {
                // Nobody left to pulse: the supervisor is gone.
                eprintln!("pulse-worker: pulse to {supervisor} failed: {err}");
                return ExitCode::FAILURE;
            }
            pulses += 1;
        }
        thread::sleep(interval);
    }
}
