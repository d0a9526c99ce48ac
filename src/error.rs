//! Error types used by the procvisor runtime.
//!
//! This module defines [`RuntimeError`]: errors raised while bootstrapping
//! or operating the watchdog itself (daemonization, heartbeat channel setup,
//! configuration, worker launch).
//!
//! Worker crashes and hangs are not errors: they are ordinary lifecycle
//! outcomes, observed by the health-check loop and published as events.
//! `RuntimeError` is reserved for failures of the supervisor machinery.
//!
//! The type provides [`RuntimeError::as_label`] and
//! [`RuntimeError::as_message`] helpers for logging/metrics.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::daemon::DaemonStage;

/// # Errors produced by the procvisor runtime.
///
/// Every variant here is fatal to the process that raises it: a watchdog
/// that cannot detach, cannot receive heartbeats, or cannot launch its
/// worker set has nothing useful left to supervise.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A step of the daemonization sequence failed.
    ///
    /// The stage identifies which step broke; the remaining steps were not
    /// attempted.
    #[error("daemonization failed at {stage}: {source}")]
    Daemonize {
        /// The stage that failed.
        stage: DaemonStage,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The heartbeat signal channel could not be established.
    ///
    /// Covers blocking the heartbeat signal and creating the descriptor
    /// that the drain task reads queued pulses from.
    #[error("heartbeat channel setup failed: {source}")]
    HeartbeatChannel {
        /// The underlying OS error.
        source: io::Error,
    },

    /// The configuration file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        /// Path that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The configuration file was read but is not valid JSON.
    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        /// Path that was being parsed.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// The configuration parsed but violates a structural constraint.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// Human-readable description of the violated constraint.
        reason: String,
    },

    /// A worker binary could not be launched.
    ///
    /// Raised both when the spawn syscall itself fails and when the worker
    /// image cannot be executed (missing binary, permission denied).
    #[error("failed to spawn worker {worker:?}: {source}")]
    Spawn {
        /// Name of the worker that failed to launch.
        worker: String,
        /// The underlying spawn/exec error.
        source: io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    ///
    /// let err = RuntimeError::ConfigInvalid { reason: "no workers defined".into() };
    /// assert_eq!(err.as_label(), "config_invalid");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Daemonize { .. } => "daemonize_failed",
            RuntimeError::HeartbeatChannel { .. } => "heartbeat_channel_failed",
            RuntimeError::ConfigIo { .. } => "config_io",
            RuntimeError::ConfigParse { .. } => "config_parse",
            RuntimeError::ConfigInvalid { .. } => "config_invalid",
            RuntimeError::Spawn { .. } => "spawn_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Daemonize { stage, source } => {
                format!("daemonize stage {stage} failed: {source}")
            }
            RuntimeError::HeartbeatChannel { source } => {
                format!("heartbeat channel: {source}")
            }
            RuntimeError::ConfigIo { path, source } => {
                format!("config read {}: {source}", path.display())
            }
            RuntimeError::ConfigParse { path, source } => {
                format!("config parse {}: {source}", path.display())
            }
            RuntimeError::ConfigInvalid { reason } => {
                format!("config invalid: {reason}")
            }
            RuntimeError::Spawn { worker, source } => {
                format!("spawn {worker}: {source}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let err = RuntimeError::HeartbeatChannel {
            source: io::Error::from_raw_os_error(libc::EMFILE),
        };
        assert_eq!(err.as_label(), "heartbeat_channel_failed");

        let err = RuntimeError::Spawn {
            worker: "core".into(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert_eq!(err.as_label(), "spawn_failed");
    }

    #[test]
    fn test_messages_carry_context() {
        let err = RuntimeError::ConfigInvalid {
            reason: "workers list is empty".into(),
        };
        assert!(err.as_message().contains("workers list is empty"));
        assert!(err.to_string().contains("workers list is empty"));

        let err = RuntimeError::Daemonize {
            stage: DaemonStage::NewSession,
            source: io::Error::from_raw_os_error(libc::EPERM),
        };
        assert!(err.to_string().contains("new_session"));
    }
}
